//! Core component model for authorable blocks.
//! Scoped field storage, hierarchy, markup serialization and handler dispatch
//! over host-provided runtime and key-value store contracts.

pub mod block;
pub mod compat;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod kvs;
pub mod logging;
pub mod markup;
pub mod plugin;
pub mod resources;
pub mod runtime;
pub mod serialization;
pub mod storage;
pub mod validation;

pub use block::{Block, BlockClass, BlockClassBuilder, HandlerRequest};
pub use config::{ConfigError, RuntimeConfig};
pub use error::{
    BlockError, BlockResult, FieldError, PluginError, ResourceError, RuntimeError, SaveError,
    XmlError,
};
pub use fields::{Field, FieldKind, Scope, ScopeIds};
pub use kvs::{FailureMap, Key, KeyValueError, KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use markup::MarkupNode;
pub use plugin::{load_tagged_classes, ClassRegistry, PluginSource, ENTRY_POINT};
pub use resources::{DirectoryResources, LocalResources};
pub use runtime::{Fragment, Runtime, WorkbenchRuntime};
pub use serialization::{
    parse_node, parse_xml_forest, parse_xml_str, ChildPolicy, ChildResolution, ExportContext,
};
pub use validation::{Validation, ValidationMessage};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
