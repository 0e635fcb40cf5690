//! Handler dispatch, runtime services, rendering and validation.

use super::{Block, HandlerRequest};
use crate::error::{BlockError, BlockResult};
use crate::runtime::{Fragment, Service};
use crate::validation::Validation;
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

impl Block {
    /// Invokes the handler registered under exactly `handler_name`.
    ///
    /// Falls back to the class's fallback handler when one is declared. The
    /// handler's result or error is returned unchanged; nothing is retried.
    pub fn handle(&mut self, handler_name: &str, request: &HandlerRequest) -> BlockResult<Value> {
        if let Some(handler) = self.class.handler(handler_name) {
            debug!(
                "event=handler_dispatch module=block status=start block_type={} handler={}",
                self.block_type(),
                handler_name
            );
            return handler(self, request);
        }
        if let Some(fallback) = self.class.fallback_handler() {
            debug!(
                "event=handler_dispatch module=block status=fallback block_type={} handler={}",
                self.block_type(),
                handler_name
            );
            return fallback(self, handler_name, request);
        }

        warn!(
            "event=handler_dispatch module=block status=not_found block_type={} handler={}",
            self.block_type(),
            handler_name
        );
        Err(BlockError::NoSuchHandler {
            block_type: self.block_type().to_string(),
            handler: handler_name.to_string(),
        })
    }

    /// Looks up a runtime service this class declared.
    ///
    /// Returns `Ok(None)` for a wanted service the runtime does not provide;
    /// a missing needed service, or one never declared, is an error.
    pub fn service(&self, name: &str) -> BlockResult<Option<Service>> {
        let needed = self.class.needs_service(name);
        if !needed && !self.class.wants_service(name) {
            return Err(BlockError::NoSuchService {
                block_type: self.block_type().to_string(),
                service: name.to_string(),
                reason: "service was not requested",
            });
        }

        match self.runtime.service(name) {
            Some(service) => Ok(Some(service)),
            None if needed => Err(BlockError::NoSuchService {
                block_type: self.block_type().to_string(),
                service: name.to_string(),
                reason: "runtime does not provide it",
            }),
            None => Ok(None),
        }
    }

    /// Renders `view` through the runtime.
    pub fn render(&mut self, view: &str, context: &Value) -> BlockResult<Fragment> {
        let runtime = Arc::clone(&self.runtime);
        runtime.render(self, view, context)
    }

    pub fn validate(&mut self) -> BlockResult<Validation> {
        let mut validation = Validation::new(self.usage_id());
        if let Some(validator) = self.class.validator() {
            validator(self, &mut validation)?;
        }
        Ok(validation)
    }
}
