//! Host runtime contract.
//!
//! # Responsibility
//! - Resolve ids to block instances and block types to classes.
//! - Supply the key-value store, id management, pointer loading and services.
//! - Provide default rendering and handler entry points.
//!
//! # Invariants
//! - Runtimes are shared (`Arc<dyn Runtime>`) and take `&self` everywhere.
//! - `handle` saves the block after a successful handler call.

mod ids;
mod workbench;

pub use ids::MemoryIdManager;
pub use workbench::{WorkbenchRuntime, WorkbenchRuntimeBuilder};

use crate::block::{Block, BlockClass, HandlerRequest};
use crate::error::{BlockError, BlockResult, RuntimeResult};
use crate::fields::ScopeIds;
use crate::kvs::KeyValueStore;
use crate::serialization::PointerResolver;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Opaque runtime-provided service object.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Rendered output of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub content: String,
}

impl Fragment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Usage -> definition -> block type lookups.
pub trait IdReader: Send + Sync {
    fn get_definition_id(&self, usage_id: &str) -> RuntimeResult<String>;
    fn get_block_type(&self, def_id: &str) -> RuntimeResult<String>;
}

/// Allocation of new definition and usage ids.
pub trait IdGenerator: Send + Sync {
    /// New definition of `block_type`; `slug` is used as the id when free.
    fn create_definition(&self, block_type: &str, slug: Option<&str>) -> RuntimeResult<String>;
    fn create_usage(&self, def_id: &str) -> RuntimeResult<String>;
}

pub trait Runtime: Send + Sync {
    fn key_value_store(&self) -> Arc<dyn KeyValueStore>;

    /// Acting user, if any.
    fn user_id(&self) -> Option<&str>;

    fn id_reader(&self) -> &dyn IdReader;

    fn id_generator(&self) -> &dyn IdGenerator;

    fn load_block_type(&self, block_type: &str) -> RuntimeResult<Arc<BlockClass>>;

    fn construct_block(&self, class: Arc<BlockClass>, scope_ids: ScopeIds) -> RuntimeResult<Block>;

    fn pointer_resolver(&self) -> Option<&dyn PointerResolver> {
        None
    }

    fn service(&self, _name: &str) -> Option<Service> {
        None
    }

    /// Instantiates the block stored under `usage_id`.
    fn get_block(&self, usage_id: &str) -> BlockResult<Block> {
        let def_id = self.id_reader().get_definition_id(usage_id)?;
        let block_type = self.id_reader().get_block_type(&def_id)?;
        let class = self.load_block_type(&block_type)?;
        let scope_ids = ScopeIds::new(
            self.user_id().map(str::to_string),
            block_type,
            def_id,
            usage_id,
        );
        Ok(self.construct_block(class, scope_ids)?)
    }

    /// Allocates ids for a new `block_type` instance and constructs it.
    fn create_block(&self, block_type: &str) -> BlockResult<Block> {
        let class = self.load_block_type(block_type)?;
        let def_id = self.id_generator().create_definition(block_type, None)?;
        let usage_id = self.id_generator().create_usage(&def_id)?;
        let scope_ids = ScopeIds::new(
            self.user_id().map(str::to_string),
            block_type,
            def_id,
            usage_id,
        );
        Ok(self.construct_block(class, scope_ids)?)
    }

    /// Runs the view function `view` registered on the block's class.
    fn render(&self, block: &mut Block, view: &str, context: &Value) -> BlockResult<Fragment> {
        let Some(view_fn) = block.class().view(view) else {
            return Err(BlockError::NoSuchView {
                block_type: block.block_type().to_string(),
                view: view.to_string(),
            });
        };
        debug!(
            "event=block_render module=runtime status=start block_type={} view={}",
            block.block_type(),
            view
        );
        view_fn(block, context)
    }

    /// Dispatches `handler` and persists whatever it changed.
    fn handle(
        &self,
        block: &mut Block,
        handler: &str,
        request: &HandlerRequest,
    ) -> BlockResult<Value> {
        let result = block.handle(handler, request)?;
        block.save()?;
        Ok(result)
    }
}
