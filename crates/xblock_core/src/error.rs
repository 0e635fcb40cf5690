//! Error taxonomy for block storage, serialization, resolution and dispatch.
//!
//! # Responsibility
//! - Give every failure enough structure (field, key, path) for callers to act.
//! - Keep one umbrella type (`BlockError`) for `?` propagation across layers.
//!
//! # Invariants
//! - Nothing in core retries; every variant is surfaced to the caller.
//! - Partial saves report a per-field failure map, never a single opaque error.
//!
//! # See also
//! - `compat` for deprecated legacy aliases.

use crate::fields::FieldKind;
use crate::kvs::KeyValueError;
use std::collections::BTreeMap;
use thiserror::Error;

pub type BlockResult<T> = Result<T, BlockError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
pub type ResourceResult<T> = Result<T, ResourceError>;
pub type XmlResult<T> = Result<T, XmlError>;

/// Field lookup, validation and decoding errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{field}` expects {expected}, got {found}")]
    Type {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },
    #[error("field `{field}` cannot be decoded from `{raw}`: {message}")]
    Deserialize {
        field: String,
        raw: String,
        message: String,
    },
}

/// Failure of a batched field write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SaveError {
    /// The backend could not take the batch at all; nothing was confirmed.
    #[error("storage unavailable during save: {0}")]
    Storage(#[from] KeyValueError),
    /// Some fields were written, the ones in `failed` were not.
    #[error("failed to save fields {:?}", .failed.keys().collect::<Vec<_>>())]
    Partial {
        saved: Vec<String>,
        failed: BTreeMap<String, KeyValueError>,
    },
}

impl SaveError {
    /// Names of fields that were confirmed written before the failure.
    pub fn saved_fields(&self) -> &[String] {
        match self {
            Self::Storage(_) => &[],
            Self::Partial { saved, .. } => saved,
        }
    }

    /// Names of fields that were not written.
    pub fn failed_fields(&self) -> Vec<&str> {
        match self {
            Self::Storage(_) => vec![],
            Self::Partial { failed, .. } => failed.keys().map(String::as_str).collect(),
        }
    }
}

/// Markup-level errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XmlError {
    #[error("malformed markup: {0}")]
    Syntax(String),
    #[error("cannot read <{tag}>: {source}")]
    Field {
        tag: String,
        #[source]
        source: FieldError,
    },
    #[error("pointer <{block_type} url_name=\"{url_name}\"> cannot be loaded: {message}")]
    Pointer {
        block_type: String,
        url_name: String,
        message: String,
    },
}

/// Plugin discovery errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("no block class registered for `{0}`")]
    Missing(String),
    #[error("block class name is invalid: `{0}`")]
    InvalidName(String),
    #[error("block class already registered: `{0}`")]
    Duplicate(String),
    #[error("block class `{name}` belongs to `{family}`, registry serves `{entry_point}`")]
    WrongFamily {
        name: String,
        family: String,
        entry_point: String,
    },
}

/// Identity resolution errors raised by a runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("no usage found for `{0}`")]
    NoSuchUsage(String),
    #[error("no definition found for `{0}`")]
    NoSuchDefinition(String),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error("runtime was released while still referenced")]
    Detached,
    #[error("runtime state is unavailable: {0}")]
    Unavailable(String),
}

/// Local resource access errors.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{reason}: {path:?}")]
    Disallowed { path: String, reason: &'static str },
    #[error("resource not found: {0:?}")]
    NotFound(String),
    #[error("cannot open resource {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error for block operations.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Storage(#[from] KeyValueError),
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("block `{block_type}` has no handler named `{handler}`")]
    NoSuchHandler { block_type: String, handler: String },
    #[error("block `{block_type}` has no view named `{view}`")]
    NoSuchView { block_type: String, view: String },
    #[error("service `{service}` unavailable to `{block_type}`: {reason}")]
    NoSuchService {
        block_type: String,
        service: String,
        reason: &'static str,
    },
    #[error("handler `{handler}` failed: {message}")]
    Handler { handler: String, message: String },
}

impl From<PluginError> for BlockError {
    fn from(value: PluginError) -> Self {
        Self::Runtime(RuntimeError::Plugin(value))
    }
}
