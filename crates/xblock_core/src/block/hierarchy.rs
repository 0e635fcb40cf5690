//! Parent/child navigation.
//!
//! # Invariants
//! - Children are returned in the order of the children field.
//! - A child id the runtime cannot resolve is an error, never skipped.
//! - The parent instance is cached until the parent field changes.

use super::{string_list, Block};
use crate::error::BlockResult;
use crate::fields::{CHILDREN_FIELD, PARENT_FIELD};
use serde_json::Value;

impl Block {
    pub fn parent_id(&mut self) -> BlockResult<Option<String>> {
        Ok(self.get(PARENT_FIELD)?.as_str().map(str::to_string))
    }

    pub fn set_parent(&mut self, parent_id: Option<&str>) -> BlockResult<()> {
        let value = parent_id.map_or(Value::Null, |id| Value::String(id.to_string()));
        self.set(PARENT_FIELD, value)?;
        Ok(())
    }

    /// Resolves the parent through the runtime, caching the instance.
    pub fn get_parent(&mut self) -> BlockResult<Option<&mut Block>> {
        let Some(parent_id) = self.parent_id()? else {
            self.parent = None;
            return Ok(None);
        };

        let cached = self
            .parent
            .as_ref()
            .is_some_and(|parent| parent.usage_id() == parent_id);
        if !cached {
            let parent = self.runtime.get_block(&parent_id)?;
            self.parent = Some(Box::new(parent));
        }
        Ok(self.parent.as_deref_mut())
    }

    /// Ordered child usage ids; empty for classes without children.
    pub fn children_ids(&mut self) -> BlockResult<Vec<String>> {
        if !self.class.has_children() {
            return Ok(vec![]);
        }
        Ok(string_list(&self.get(CHILDREN_FIELD)?))
    }

    /// Instantiates every child in declaration order.
    pub fn get_children(&mut self) -> BlockResult<Vec<Block>> {
        let ids = self.children_ids()?;
        let mut children = Vec::with_capacity(ids.len());
        for id in ids {
            children.push(self.runtime.get_block(&id)?);
        }
        Ok(children)
    }

    /// Instantiates one child; `None` when `usage_id` is not a child.
    pub fn get_child(&mut self, usage_id: &str) -> BlockResult<Option<Block>> {
        if !self.children_ids()?.iter().any(|id| id == usage_id) {
            return Ok(None);
        }
        Ok(Some(self.runtime.get_block(usage_id)?))
    }

    /// Appends `usage_id` to the children field.
    pub fn add_child(&mut self, usage_id: &str) -> BlockResult<()> {
        let mut ids = string_list(&self.get(CHILDREN_FIELD)?);
        ids.push(usage_id.to_string());
        self.set(CHILDREN_FIELD, ids)?;
        Ok(())
    }
}
