//! Storage scopes and block identity.
//!
//! # Responsibility
//! - Classify every field into a fixed storage partition.
//! - Carry the identity tuple used to derive storage keys.
//!
//! # Invariants
//! - A field's scope is chosen at declaration time and never changes.
//! - `ScopeIds` is immutable once constructed.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// User dimension of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserScope {
    /// Value is shared by every user.
    None,
    /// Value is private to the acting user.
    One,
    /// Value aggregates over all users.
    All,
}

/// Block dimension of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockScope {
    /// One value per usage of a definition.
    Usage,
    /// One value per definition, shared by all its usages.
    Definition,
    /// One value per block type.
    Type,
    /// One value for every block.
    All,
}

/// Named storage partition for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    UserState,
    Settings,
    Content,
    UserStateSummary,
    Preferences,
    UserInfo,
    Parent,
    Children,
}

impl Scope {
    /// Every named scope, in declaration order.
    pub const ALL: [Scope; 8] = [
        Scope::UserState,
        Scope::Settings,
        Scope::Content,
        Scope::UserStateSummary,
        Scope::Preferences,
        Scope::UserInfo,
        Scope::Parent,
        Scope::Children,
    ];

    pub fn user(self) -> UserScope {
        match self {
            Self::UserState | Self::Preferences | Self::UserInfo => UserScope::One,
            Self::UserStateSummary => UserScope::All,
            Self::Settings | Self::Content | Self::Parent | Self::Children => UserScope::None,
        }
    }

    pub fn block(self) -> BlockScope {
        match self {
            Self::UserState | Self::Settings | Self::UserStateSummary | Self::Parent => {
                BlockScope::Usage
            }
            Self::Content | Self::Children => BlockScope::Definition,
            Self::Preferences => BlockScope::Type,
            Self::UserInfo => BlockScope::All,
        }
    }

    /// Whether values in this scope are isolated per acting user.
    pub fn is_user_specific(self) -> bool {
        self.user() == UserScope::One
    }

    /// Stable string id, also used as the storage column value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserState => "user_state",
            Self::Settings => "settings",
            Self::Content => "content",
            Self::UserStateSummary => "user_state_summary",
            Self::Preferences => "preferences",
            Self::UserInfo => "user_info",
            Self::Parent => "parent",
            Self::Children => "children",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.as_str() == value)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity tuple for one block instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeIds {
    user_id: Option<String>,
    block_type: String,
    def_id: String,
    usage_id: String,
}

impl ScopeIds {
    pub fn new(
        user_id: Option<String>,
        block_type: impl Into<String>,
        def_id: impl Into<String>,
        usage_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            block_type: block_type.into(),
            def_id: def_id.into(),
            usage_id: usage_id.into(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn def_id(&self) -> &str {
        &self.def_id
    }

    pub fn usage_id(&self) -> &str {
        &self.usage_id
    }

    /// Block identity for the given block dimension.
    ///
    /// Returns `None` for `BlockScope::All`, which is not keyed by any block.
    pub fn block_scope_id(&self, block_scope: BlockScope) -> Option<&str> {
        match block_scope {
            BlockScope::Usage => Some(&self.usage_id),
            BlockScope::Definition => Some(&self.def_id),
            BlockScope::Type => Some(&self.block_type),
            BlockScope::All => None,
        }
    }

    /// User identity for the given user dimension.
    ///
    /// Only `UserScope::One` is keyed by the acting user.
    pub fn user_scope_id(&self, user_scope: UserScope) -> Option<&str> {
        match user_scope {
            UserScope::One => self.user_id.as_deref(),
            UserScope::None | UserScope::All => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockScope, Scope, ScopeIds, UserScope};

    #[test]
    fn named_scopes_decompose_into_dimensions() {
        assert_eq!(Scope::UserState.user(), UserScope::One);
        assert_eq!(Scope::UserState.block(), BlockScope::Usage);
        assert_eq!(Scope::Content.block(), BlockScope::Definition);
        assert_eq!(Scope::Preferences.block(), BlockScope::Type);
        assert_eq!(Scope::UserInfo.block(), BlockScope::All);
        assert_eq!(Scope::UserStateSummary.user(), UserScope::All);
        assert!(!Scope::Settings.is_user_specific());
    }

    #[test]
    fn scope_strings_round_trip() {
        for scope in Scope::ALL {
            assert_eq!(Scope::parse(scope.as_str()), Some(scope));
        }
        assert_eq!(Scope::parse("course"), None);
    }

    #[test]
    fn identity_for_scope_follows_block_dimension() {
        let ids = ScopeIds::new(Some("u1".to_string()), "video", "d1", "u-1");
        assert_eq!(ids.block_scope_id(BlockScope::Usage), Some("u-1"));
        assert_eq!(ids.block_scope_id(BlockScope::Definition), Some("d1"));
        assert_eq!(ids.block_scope_id(BlockScope::Type), Some("video"));
        assert_eq!(ids.block_scope_id(BlockScope::All), None);
        assert_eq!(ids.user_scope_id(UserScope::One), Some("u1"));
        assert_eq!(ids.user_scope_id(UserScope::All), None);
    }
}
