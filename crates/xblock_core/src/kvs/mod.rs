//! Key-value store contract used by scoped field storage.
//!
//! # Responsibility
//! - Define the storage key shape derived from scope and block identity.
//! - Define the opaque backend contract (`get`, `set`, `set_many`, ...).
//!
//! # Invariants
//! - `get` on a missing key returns `KeyValueError::KeyNotFound`, never a default.
//! - `set_many` reports per-key failures in its return map; an `Err` means the
//!   backend took nothing.

use crate::fields::{Scope, ScopeIds};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

mod memory;
mod sqlite;

pub use memory::MemoryKeyValueStore;
pub use sqlite::{SqliteKeyValueStore, MAX_VALUE_BYTES};

pub type KvResult<T> = Result<T, KeyValueError>;

/// Per-key failures of one batched write.
pub type FailureMap = BTreeMap<Key, KeyValueError>;

/// Fully qualified storage key for one field value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub scope: Scope,
    pub user_id: Option<String>,
    pub block_scope_id: Option<String>,
    pub field_name: String,
    pub block_family: String,
}

impl Key {
    /// Derives the key for `field_name` in `scope` for the block identified by
    /// `scope_ids`.
    pub fn for_field(
        scope_ids: &ScopeIds,
        scope: Scope,
        field_name: &str,
        block_family: &str,
    ) -> Self {
        Self {
            scope,
            user_id: scope_ids.user_scope_id(scope.user()).map(str::to_string),
            block_scope_id: scope_ids.block_scope_id(scope.block()).map(str::to_string),
            field_name: field_name.to_string(),
            block_family: block_family.to_string(),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.block_family,
            self.scope,
            self.user_id.as_deref().unwrap_or("-"),
            self.block_scope_id.as_deref().unwrap_or("-"),
            self.field_name
        )
    }
}

/// Backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyValueError {
    #[error("key not found: {0}")]
    KeyNotFound(Key),
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected for {key}: {message}")]
    Rejected { key: Key, message: String },
    #[error("key-value backend error: {0}")]
    Backend(String),
}

/// Opaque persistence backend for field values.
///
/// Implementations are shared between block instances and must use interior
/// mutability.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &Key) -> KvResult<Value>;
    fn set(&self, key: &Key, value: Value) -> KvResult<()>;
    fn delete(&self, key: &Key) -> KvResult<()>;
    fn has(&self, key: &Key) -> KvResult<bool>;

    /// Writes a batch, returning the keys that failed.
    ///
    /// The default writes one key at a time; an unavailable backend aborts the
    /// batch with `Err`.
    fn set_many(&self, updates: Vec<(Key, Value)>) -> KvResult<FailureMap> {
        let mut failures = FailureMap::new();
        for (key, value) in updates {
            match self.set(&key, value) {
                Ok(()) => {}
                Err(KeyValueError::Unavailable(message)) => {
                    return Err(KeyValueError::Unavailable(message));
                }
                Err(err) => {
                    failures.insert(key, err);
                }
            }
        }
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::Key;
    use crate::fields::{Scope, ScopeIds};

    fn ids() -> ScopeIds {
        ScopeIds::new(Some("alice".to_string()), "problem", "def-1", "use-1")
    }

    #[test]
    fn user_state_key_carries_user_and_usage() {
        let key = Key::for_field(&ids(), Scope::UserState, "attempts", "xblock.v1");
        assert_eq!(key.user_id.as_deref(), Some("alice"));
        assert_eq!(key.block_scope_id.as_deref(), Some("use-1"));
    }

    #[test]
    fn content_key_is_keyed_by_definition_without_user() {
        let key = Key::for_field(&ids(), Scope::Content, "data", "xblock.v1");
        assert_eq!(key.user_id, None);
        assert_eq!(key.block_scope_id.as_deref(), Some("def-1"));
    }

    #[test]
    fn preferences_are_keyed_by_type_and_user_info_by_user_only() {
        let pref = Key::for_field(&ids(), Scope::Preferences, "speed", "xblock.v1");
        assert_eq!(pref.block_scope_id.as_deref(), Some("problem"));
        assert_eq!(pref.user_id.as_deref(), Some("alice"));

        let info = Key::for_field(&ids(), Scope::UserInfo, "locale", "xblock.v1");
        assert_eq!(info.block_scope_id, None);
        assert_eq!(info.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn summary_scope_drops_user_identity() {
        let key = Key::for_field(&ids(), Scope::UserStateSummary, "votes", "xblock.v1");
        assert_eq!(key.user_id, None);
        assert_eq!(
            key.to_string(),
            "xblock.v1/user_state_summary/-/use-1/votes"
        );
    }
}
