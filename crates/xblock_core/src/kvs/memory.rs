//! In-process key-value store.

use super::{Key, KeyValueError, KeyValueStore, KvResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Map-backed store shared by every block of one runtime.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<BTreeMap<Key, Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|values| values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored entry, ordered by key.
    pub fn snapshot(&self) -> KvResult<BTreeMap<Key, Value>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> KvResult<MutexGuard<'_, BTreeMap<Key, Value>>> {
        self.values
            .lock()
            .map_err(|_| KeyValueError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &Key) -> KvResult<Value> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| KeyValueError::KeyNotFound(key.clone()))
    }

    fn set(&self, key: &Key, value: Value) -> KvResult<()> {
        self.lock()?.insert(key.clone(), value);
        Ok(())
    }

    fn delete(&self, key: &Key) -> KvResult<()> {
        match self.lock()?.remove(key) {
            Some(_) => Ok(()),
            None => Err(KeyValueError::KeyNotFound(key.clone())),
        }
    }

    fn has(&self, key: &Key) -> KvResult<bool> {
        Ok(self.lock()?.contains_key(key))
    }
}
