//! Field descriptors.
//!
//! # Responsibility
//! - Describe one typed, scoped attribute of a block class.
//! - Validate values and convert them to and from their markup form.
//!
//! # Invariants
//! - The declared default is only handed out as a fresh copy.
//! - `Value::Null` is accepted by every kind.

use super::scope::Scope;
use crate::error::FieldError;
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Value shape a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Dict,
    /// Usage id of another block.
    Reference,
    /// Ordered usage ids of other blocks.
    ReferenceList,
    /// Any JSON value.
    Any,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Reference => "reference",
            Self::ReferenceList => "reference list",
            Self::Any => "any",
        }
    }

    /// Default used when a field declares none.
    pub fn implicit_default(self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            Self::List | Self::ReferenceList => Value::Array(vec![]),
            Self::Dict => Value::Object(Default::default()),
            _ => Value::Null,
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (Self::Any, _) => true,
            (Self::String | Self::Reference, Value::String(_)) => true,
            (Self::Integer, Value::Number(number)) => number.is_i64() || number.is_u64(),
            (Self::Float, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::List, Value::Array(_)) => true,
            (Self::ReferenceList, Value::Array(items)) => items.iter().all(Value::is_string),
            (Self::Dict, Value::Object(_)) => true,
            _ => false,
        }
    }

    /// Strings are written verbatim into markup; everything else as JSON.
    fn is_textual(self) -> bool {
        matches!(self, Self::String | Self::Reference)
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed attribute descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    scope: Scope,
    default: Value,
    enforce_type: bool,
    display_name: Option<String>,
    help: Option<String>,
    xml_name: Option<String>,
    xml_node: bool,
    none_to_xml: bool,
    force_export: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind, scope: Scope) -> Self {
        Self {
            name: name.into(),
            kind,
            scope,
            default: kind.implicit_default(),
            enforce_type: false,
            display_name: None,
            help: None,
            xml_name: None,
            xml_node: false,
            none_to_xml: false,
            force_export: false,
        }
    }

    pub fn string(name: impl Into<String>, scope: Scope) -> Self {
        Self::new(name, FieldKind::String, scope)
    }

    pub fn integer(name: impl Into<String>, scope: Scope) -> Self {
        Self::new(name, FieldKind::Integer, scope)
    }

    pub fn float(name: impl Into<String>, scope: Scope) -> Self {
        Self::new(name, FieldKind::Float, scope)
    }

    pub fn boolean(name: impl Into<String>, scope: Scope) -> Self {
        Self::new(name, FieldKind::Boolean, scope)
    }

    pub fn list(name: impl Into<String>, scope: Scope) -> Self {
        Self::new(name, FieldKind::List, scope)
    }

    pub fn dict(name: impl Into<String>, scope: Scope) -> Self {
        Self::new(name, FieldKind::Dict, scope)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Rejects mistyped assignments instead of logging them.
    pub fn enforce_type(mut self) -> Self {
        self.enforce_type = true;
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Serializes under `xml_name` instead of the field name.
    pub fn xml_name(mut self, xml_name: impl Into<String>) -> Self {
        self.xml_name = Some(xml_name.into());
        self
    }

    /// Serializes as an `option:` child element instead of an attribute.
    pub fn xml_node(mut self) -> Self {
        self.xml_node = true;
        self
    }

    /// Serializes a null value as `none="true"` instead of dropping it.
    pub fn none_to_xml(mut self) -> Self {
        self.none_to_xml = true;
        self
    }

    /// Serializes even when the value equals the default.
    pub fn force_export(mut self) -> Self {
        self.force_export = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn enforces_type(&self) -> bool {
        self.enforce_type
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Attribute or element name used in markup.
    pub fn serialized_name(&self) -> &str {
        self.xml_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_xml_node(&self) -> bool {
        self.xml_node
    }

    pub fn is_none_to_xml(&self) -> bool {
        self.none_to_xml
    }

    pub fn is_force_export(&self) -> bool {
        self.force_export
    }

    /// Fresh copy of the declared default.
    pub fn default_value(&self) -> Value {
        self.default.clone()
    }

    pub fn is_default(&self, value: &Value) -> bool {
        &self.default == value
    }

    pub fn validate(&self, value: &Value) -> Result<(), FieldError> {
        if self.kind.accepts(value) {
            return Ok(());
        }
        Err(FieldError::Type {
            field: self.name.clone(),
            expected: self.kind,
            found: json_type_name(value),
        })
    }

    /// Decodes a raw stored value.
    ///
    /// No type check happens here; `set` is the only place a type mismatch is
    /// rejected, so whatever `set` accepted reads back unchanged.
    pub fn from_json(&self, raw: Value) -> Value {
        raw
    }

    /// Encodes a value for storage.
    pub fn to_json(&self, value: &Value) -> Value {
        value.clone()
    }

    /// Markup text for `value`; `None` for null.
    pub fn to_markup(&self, value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(text) if self.kind.is_textual() => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Decodes markup text produced by `to_markup`.
    pub fn from_markup(&self, raw: &str) -> Result<Value, FieldError> {
        if self.kind.is_textual() {
            return Ok(Value::String(raw.to_string()));
        }
        serde_json::from_str(raw.trim()).map_err(|err| FieldError::Deserialize {
            field: self.name.clone(),
            raw: raw.to_string(),
            message: err.to_string(),
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
