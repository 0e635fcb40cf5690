//! In-memory id allocation.

use super::{IdGenerator, IdReader};
use crate::error::{RuntimeError, RuntimeResult};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct IdTables {
    /// usage id -> definition id
    usages: BTreeMap<String, String>,
    /// definition id -> block type
    definitions: BTreeMap<String, String>,
}

/// Id reader and generator backed by two in-memory maps.
#[derive(Debug, Default)]
pub struct MemoryIdManager {
    tables: Mutex<IdTables>,
}

impl MemoryIdManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> RuntimeResult<MutexGuard<'_, IdTables>> {
        self.tables
            .lock()
            .map_err(|_| RuntimeError::Unavailable("id tables lock poisoned".to_string()))
    }
}

impl IdReader for MemoryIdManager {
    fn get_definition_id(&self, usage_id: &str) -> RuntimeResult<String> {
        self.tables()?
            .usages
            .get(usage_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NoSuchUsage(usage_id.to_string()))
    }

    fn get_block_type(&self, def_id: &str) -> RuntimeResult<String> {
        self.tables()?
            .definitions
            .get(def_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NoSuchDefinition(def_id.to_string()))
    }
}

impl IdGenerator for MemoryIdManager {
    fn create_definition(&self, block_type: &str, slug: Option<&str>) -> RuntimeResult<String> {
        let mut tables = self.tables()?;
        let def_id = match slug.filter(|slug| !slug.is_empty()) {
            Some(slug) if !tables.definitions.contains_key(slug) => slug.to_string(),
            Some(slug) => format!("{slug}-{}", Uuid::new_v4().simple()),
            None => format!("{block_type}-d-{}", Uuid::new_v4().simple()),
        };
        tables
            .definitions
            .insert(def_id.clone(), block_type.to_string());
        Ok(def_id)
    }

    fn create_usage(&self, def_id: &str) -> RuntimeResult<String> {
        let mut tables = self.tables()?;
        let Some(block_type) = tables.definitions.get(def_id) else {
            return Err(RuntimeError::NoSuchDefinition(def_id.to_string()));
        };
        let usage_id = format!("{block_type}-u-{}", Uuid::new_v4().simple());
        tables.usages.insert(usage_id.clone(), def_id.to_string());
        Ok(usage_id)
    }
}
