//! Runtime configuration.
//!
//! # Responsibility
//! - Collect logging and runtime knobs in one serde-readable struct.
//! - Read overrides from `XBLOCK_*` environment variables.
//!
//! # Invariants
//! - Missing keys fall back to `Default`; unknown keys are rejected.

use crate::logging::default_log_level;
use crate::plugin::ENTRY_POINT;
use crate::serialization::ChildResolution;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_LOG_LEVEL: &str = "XBLOCK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "XBLOCK_LOG_DIR";
pub const ENV_CHILD_RESOLUTION: &str = "XBLOCK_CHILD_RESOLUTION";
pub const ENV_ENTRY_POINT: &str = "XBLOCK_ENTRY_POINT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value `{value}` for {name}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub log_level: String,
    /// Absolute log directory; file logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub child_resolution: ChildResolution,
    /// Family a `ClassRegistry::from_config` registry accepts.
    pub entry_point: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            child_resolution: ChildResolution::default(),
            entry_point: ENTRY_POINT.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Defaults overlaid with whatever `XBLOCK_*` variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|dir| !dir.trim().is_empty()) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        let entry_point = lookup(ENV_ENTRY_POINT);
        if let Some(entry_point) = entry_point.filter(|value| !value.trim().is_empty()) {
            config.entry_point = entry_point.trim().to_string();
        }
        if let Some(value) = lookup(ENV_CHILD_RESOLUTION) {
            config.child_resolution = match value.trim().to_ascii_lowercase().as_str() {
                "strict" => ChildResolution::Strict,
                "lenient" => ChildResolution::Lenient,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: ENV_CHILD_RESOLUTION,
                        value,
                    })
                }
            };
        }
        Ok(config)
    }
}
