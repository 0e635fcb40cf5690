//! Block instances.
//!
//! # Responsibility
//! - Compose scoped storage, hierarchy navigation, handler dispatch and
//!   serialization on one concrete instance type.
//! - Expose explicit field accessors instead of attribute interception.
//!
//! # Invariants
//! - A block never owns its runtime; it holds a shared handle.
//! - `ScopeIds` are fixed at construction.
//! - Reassigning the parent field invalidates the cached parent instance.

mod class;
mod dispatch;
mod hierarchy;

pub use class::{
    BlockClass, BlockClassBuilder, FallbackHandlerFn, HandlerFn, HandlerRequest, ValidatorFn,
    ViewFn,
};

use crate::error::{BlockResult, FieldError, ResourceResult, SaveError};
use crate::fields::{ScopeIds, NAME_FIELD, PARENT_FIELD, TAGS_FIELD};
use crate::runtime::Runtime;
use crate::storage::ScopedStorage;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::sync::Arc;

/// One block instance.
pub struct Block {
    class: Arc<BlockClass>,
    scope_ids: ScopeIds,
    runtime: Arc<dyn Runtime>,
    storage: ScopedStorage,
    parent: Option<Box<Block>>,
    extra_attributes: Vec<(String, String)>,
}

impl Block {
    /// Builds an instance; runtimes call this from `construct_block`.
    pub fn new(runtime: Arc<dyn Runtime>, class: Arc<BlockClass>, scope_ids: ScopeIds) -> Self {
        let storage = ScopedStorage::new(
            scope_ids.clone(),
            class.family(),
            Arc::clone(class.fields()),
            runtime.key_value_store(),
        );
        Self {
            class,
            scope_ids,
            runtime,
            storage,
            parent: None,
            extra_attributes: Vec::new(),
        }
    }

    pub fn class(&self) -> &Arc<BlockClass> {
        &self.class
    }

    /// Markup tag this instance was created for; differs from the class name
    /// when a registry's default class stood in.
    pub fn block_type(&self) -> &str {
        self.scope_ids.block_type()
    }

    pub fn scope_ids(&self) -> &ScopeIds {
        &self.scope_ids
    }

    pub fn usage_id(&self) -> &str {
        self.scope_ids.usage_id()
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn class_tags(&self) -> &BTreeSet<String> {
        self.class.tags()
    }

    pub fn get(&mut self, name: &str) -> BlockResult<Value> {
        self.storage.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FieldError> {
        self.storage.set(name, value.into())?;
        if name == PARENT_FIELD {
            self.parent = None;
        }
        Ok(())
    }

    /// Resets a field to its default, removing any stored value.
    pub fn delete(&mut self, name: &str) -> BlockResult<()> {
        self.storage.delete(name)?;
        if name == PARENT_FIELD {
            self.parent = None;
        }
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> BlockResult<bool> {
        self.storage.is_set(name)
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.storage.is_dirty(name)
    }

    pub fn dirty_fields(&self) -> Vec<&str> {
        self.storage.dirty_fields()
    }

    pub fn save(&mut self) -> Result<(), SaveError> {
        self.storage.save()
    }

    pub fn force_save_fields(&mut self, names: &[&str]) -> BlockResult<()> {
        self.storage.force_save_fields(names)
    }

    pub fn name(&mut self) -> BlockResult<Option<String>> {
        Ok(self.get(NAME_FIELD)?.as_str().map(str::to_string))
    }

    pub fn tags(&mut self) -> BlockResult<Vec<String>> {
        Ok(string_list(&self.get(TAGS_FIELD)?))
    }

    /// Markup attributes that matched no field, kept for re-export.
    pub fn extra_attributes(&self) -> &[(String, String)] {
        &self.extra_attributes
    }

    pub(crate) fn preserve_attribute(&mut self, name: &str, value: &str) {
        self.extra_attributes
            .push((name.to_string(), value.to_string()));
    }

    pub fn open_local_resource(&self, uri: &str) -> ResourceResult<Box<dyn Read + Send>> {
        self.class.open_local_resource(uri)
    }
}

impl Debug for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("block_type", &self.class.name())
            .field("scope_ids", &self.scope_ids)
            .field("dirty", &self.storage.dirty_fields())
            .finish_non_exhaustive()
    }
}

pub(crate) fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
