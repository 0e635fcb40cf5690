//! Field descriptors, scopes and the per-class field table.
//!
//! # Responsibility
//! - Declare typed, scoped fields.
//! - Provide the fields every block class inherits.
//!
//! # Invariants
//! - Field names are unique within one `FieldSet`; redeclaring a name replaces
//!   the earlier declaration in place.

mod field;
mod scope;

pub use field::{Field, FieldKind};
pub use scope::{BlockScope, Scope, ScopeIds, UserScope};

use crate::error::FieldError;

pub const NAME_FIELD: &str = "name";
pub const TAGS_FIELD: &str = "tags";
pub const PARENT_FIELD: &str = "parent";
pub const CHILDREN_FIELD: &str = "children";
pub const CONTENT_FIELD: &str = "content";

/// Ordered field table of one block class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `field`, replacing an existing field of the same name.
    pub fn insert(&mut self, field: Field) {
        match self
            .fields
            .iter_mut()
            .find(|existing| existing.name() == field.name())
        {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn require(&self, name: &str) -> Result<&Field, FieldError> {
        self.get(name)
            .ok_or_else(|| FieldError::UnknownField(name.to_string()))
    }

    /// Looks a field up by its markup name.
    pub fn by_serialized_name(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.serialized_name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Fields declared by every block class.
pub fn base_fields() -> Vec<Field> {
    vec![
        Field::string(NAME_FIELD, Scope::Settings).help("Short name for the block"),
        Field::list(TAGS_FIELD, Scope::Settings).help("Tags for this block"),
        Field::new(PARENT_FIELD, FieldKind::Reference, Scope::Parent)
            .help("The id of the parent of this block"),
    ]
}

/// Field added to classes that have children.
pub fn children_field() -> Field {
    Field::new(CHILDREN_FIELD, FieldKind::ReferenceList, Scope::Children)
        .help("The ids of the children of this block")
}
