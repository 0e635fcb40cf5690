//! Per-instance field cache over the key-value store.
//!
//! # Responsibility
//! - Serve field reads from cache, then store, then the declared default.
//! - Defer writes until an explicit save and submit them as one batch.
//!
//! # Invariants
//! - Dirtiness is cleared only for fields the store confirmed written.
//! - A backend that cannot take the batch leaves every field dirty.
//! - Field values are never logged, only field names and counts.
//! - A value `set` accepted reads back unchanged; reads never re-check types.

use crate::error::{BlockResult, FieldError, SaveError};
use crate::fields::{Field, FieldSet, ScopeIds};
use crate::kvs::{Key, KeyValueError, KeyValueStore};
use log::{error, info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

/// Cached, lazily loaded field values of one block instance.
pub struct ScopedStorage {
    scope_ids: ScopeIds,
    family: String,
    fields: Arc<FieldSet>,
    store: Arc<dyn KeyValueStore>,
    cache: BTreeMap<String, Value>,
    dirty: BTreeSet<String>,
}

impl ScopedStorage {
    pub fn new(
        scope_ids: ScopeIds,
        family: impl Into<String>,
        fields: Arc<FieldSet>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            scope_ids,
            family: family.into(),
            fields,
            store,
            cache: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Storage key for `field` of this instance.
    pub fn key_for(&self, field: &Field) -> Key {
        Key::for_field(&self.scope_ids, field.scope(), field.name(), &self.family)
    }

    /// Reads a field: cache, then store, then a fresh copy of the default.
    pub fn get(&mut self, name: &str) -> BlockResult<Value> {
        if let Some(value) = self.cache.get(name) {
            return Ok(value.clone());
        }

        let field = self.fields.require(name)?;
        let key = self.key_for(field);
        let value = match self.store.get(&key) {
            Ok(raw) => field.from_json(raw),
            Err(KeyValueError::KeyNotFound(_)) => field.default_value(),
            Err(err) => return Err(err.into()),
        };
        self.cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Caches `value` and marks the field dirty; nothing reaches the store
    /// until `save`.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let field = self.fields.require(name)?;
        if let Err(err) = field.validate(&value) {
            if field.enforces_type() {
                return Err(err);
            }
            warn!(
                "event=field_set module=storage status=type_mismatch block={} field={} error={}",
                self.scope_ids.usage_id(),
                name,
                err
            );
        }
        self.cache.insert(name.to_string(), value);
        self.dirty.insert(name.to_string());
        Ok(())
    }

    /// Drops the cached value and removes the stored one immediately.
    pub fn delete(&mut self, name: &str) -> BlockResult<()> {
        let field = self.fields.require(name)?;
        let key = self.key_for(field);
        self.cache.remove(name);
        self.dirty.remove(name);
        match self.store.delete(&key) {
            Ok(()) | Err(KeyValueError::KeyNotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether the field holds an explicit value, pending or stored.
    pub fn is_set(&self, name: &str) -> BlockResult<bool> {
        let field = self.fields.require(name)?;
        if self.dirty.contains(name) {
            return Ok(true);
        }
        Ok(self.store.has(&self.key_for(field))?)
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    pub fn dirty_fields(&self) -> Vec<&str> {
        self.dirty.iter().map(String::as_str).collect()
    }

    /// Writes every dirty field in one batch.
    pub fn save(&mut self) -> Result<(), SaveError> {
        let names: Vec<String> = self.dirty.iter().cloned().collect();
        self.write_batch(names)
    }

    /// Writes the named fields in one batch whether or not they are dirty.
    pub fn force_save_fields(&mut self, names: &[&str]) -> BlockResult<()> {
        for name in names {
            self.get(name)?;
        }
        let names = names.iter().map(|name| name.to_string()).collect();
        self.write_batch(names)?;
        Ok(())
    }

    fn write_batch(&mut self, names: Vec<String>) -> Result<(), SaveError> {
        if names.is_empty() {
            return Ok(());
        }

        let started_at = Instant::now();
        let mut updates = Vec::with_capacity(names.len());
        let mut batch = Vec::with_capacity(names.len());
        for name in names {
            let (Some(field), Some(value)) = (self.fields.get(&name), self.cache.get(&name)) else {
                continue;
            };
            let key = self.key_for(field);
            updates.push((key.clone(), field.to_json(value)));
            batch.push((key, name));
        }

        let total = updates.len();
        let failures = match self.store.set_many(updates) {
            Ok(failures) => failures,
            Err(err) => {
                error!(
                    "event=block_save module=storage status=error block={} fields={} duration_ms={} error={}",
                    self.scope_ids.usage_id(),
                    total,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(SaveError::Storage(err));
            }
        };

        let mut saved = Vec::new();
        let mut failed = BTreeMap::new();
        for (key, name) in batch {
            match failures.get(&key) {
                Some(err) => {
                    failed.insert(name, err.clone());
                }
                None => {
                    self.dirty.remove(&name);
                    saved.push(name);
                }
            }
        }

        if failed.is_empty() {
            info!(
                "event=block_save module=storage status=ok block={} fields={} duration_ms={}",
                self.scope_ids.usage_id(),
                total,
                started_at.elapsed().as_millis()
            );
            return Ok(());
        }

        warn!(
            "event=block_save module=storage status=partial block={} saved={} failed={:?}",
            self.scope_ids.usage_id(),
            saved.len(),
            failed.keys().collect::<Vec<_>>()
        );
        Err(SaveError::Partial { saved, failed })
    }
}

#[cfg(test)]
mod tests {
    use super::ScopedStorage;
    use crate::error::{BlockError, FieldError};
    use crate::fields::{Field, FieldSet, Scope, ScopeIds};
    use crate::kvs::{KeyValueStore, MemoryKeyValueStore};
    use serde_json::json;
    use std::sync::Arc;

    fn storage(store: Arc<MemoryKeyValueStore>) -> ScopedStorage {
        let mut fields = FieldSet::new();
        fields.insert(Field::integer("count", Scope::UserState).with_default(3));
        fields.insert(Field::string("title", Scope::Content).enforce_type());
        let ids = ScopeIds::new(Some("u".to_string()), "counter", "d1", "u1");
        ScopedStorage::new(ids, "xblock.v1", Arc::new(fields), store)
    }

    #[test]
    fn set_is_deferred_until_save() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut storage = storage(Arc::clone(&store));

        storage.set("count", json!(7)).expect("set");
        assert!(storage.is_dirty("count"));
        assert!(store.is_empty());
        assert_eq!(storage.get("count").expect("cached"), json!(7));

        storage.save().expect("save");
        assert!(!storage.is_dirty("count"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn enforced_type_rejects_mismatch() {
        let mut storage = storage(Arc::new(MemoryKeyValueStore::new()));
        let err = storage.set("title", json!(5)).expect_err("title is a string");
        assert!(matches!(err, FieldError::Type { .. }));
        assert!(!storage.is_dirty("title"));
    }

    #[test]
    fn unenforced_type_mismatch_is_accepted() {
        let mut storage = storage(Arc::new(MemoryKeyValueStore::new()));
        storage.set("count", json!("many")).expect("not enforced");
        assert_eq!(storage.get("count").expect("cached"), json!("many"));
    }

    #[test]
    fn unknown_field_is_reported() {
        let mut storage = storage(Arc::new(MemoryKeyValueStore::new()));
        let err = storage.get("nope").expect_err("unknown field");
        assert!(matches!(err, BlockError::Field(FieldError::UnknownField(_))));
    }

    #[test]
    fn force_save_writes_clean_fields() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut storage = storage(Arc::clone(&store));
        storage.force_save_fields(&["count"]).expect("force save");

        let field = storage.fields().get("count").expect("field").clone();
        assert_eq!(store.get(&storage.key_for(&field)).expect("stored"), json!(3));
    }

    #[test]
    fn delete_removes_stored_value() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut storage = storage(Arc::clone(&store));
        storage.set("count", json!(9)).expect("set");
        storage.save().expect("save");
        assert!(storage.is_set("count").expect("is_set"));

        storage.delete("count").expect("delete");
        assert!(!storage.is_set("count").expect("is_set"));
        assert_eq!(storage.get("count").expect("default"), json!(3));
    }
}
