//! Block class discovery by entry point.
//!
//! # Responsibility
//! - Enumerate `(name, class)` pairs registered under one entry-point family.
//! - Filter classes by frozen class tag without caching.
//!
//! # Invariants
//! - Class names are valid markup tag names and unique within a registry.
//! - A registry only accepts classes of its own entry-point family.

use crate::block::BlockClass;
use crate::config::RuntimeConfig;
use crate::error::PluginError;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry-point family every block class is registered under.
pub const ENTRY_POINT: &str = "xblock.v1";

static CLASS_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("valid class name regex")
});

/// External discovery collaborator.
pub trait PluginSource {
    fn entry_point(&self) -> &str;

    /// Every registered `(name, class)` pair, in a stable order.
    fn load_classes(&self) -> Box<dyn Iterator<Item = (String, Arc<BlockClass>)> + '_>;
}

/// Lazily yields the classes whose frozen tag set contains `tag`.
pub fn load_tagged_classes<'a>(
    source: &'a dyn PluginSource,
    tag: &'a str,
) -> impl Iterator<Item = (String, Arc<BlockClass>)> + 'a {
    source
        .load_classes()
        .filter(move |(_, class)| class.has_tag(tag))
}

/// In-process registry of block classes.
#[derive(Debug)]
pub struct ClassRegistry {
    entry_point: String,
    classes: BTreeMap<String, Arc<BlockClass>>,
    default_class: Option<Arc<BlockClass>>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::with_entry_point(ENTRY_POINT)
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry_point(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            classes: BTreeMap::new(),
            default_class: None,
        }
    }

    /// Empty registry for the entry point named in `config`.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_entry_point(config.entry_point.as_str())
    }

    /// Registers `class` under its own name.
    ///
    /// # Errors
    /// - `InvalidName` when the name cannot be used as a markup tag.
    /// - `WrongFamily` when the class belongs to another entry point.
    /// - `Duplicate` when the name is already taken.
    pub fn register(&mut self, class: Arc<BlockClass>) -> Result<(), PluginError> {
        let name = class.name().to_string();
        if !CLASS_NAME_RE.is_match(&name) {
            return Err(PluginError::InvalidName(name));
        }
        if class.family() != self.entry_point {
            return Err(PluginError::WrongFamily {
                name,
                family: class.family().to_string(),
                entry_point: self.entry_point.clone(),
            });
        }
        if self.classes.contains_key(&name) {
            return Err(PluginError::Duplicate(name));
        }

        debug!(
            "event=class_register module=plugin status=ok name={} tags={}",
            name,
            class.tags().len()
        );
        self.classes.insert(name, class);
        Ok(())
    }

    /// Class answering for names nothing registered.
    pub fn set_default_class(&mut self, class: Arc<BlockClass>) {
        info!(
            "event=class_default module=plugin status=ok name={}",
            class.name()
        );
        self.default_class = Some(class);
    }

    pub fn load_class(&self, name: &str) -> Result<Arc<BlockClass>, PluginError> {
        if let Some(class) = self.classes.get(name) {
            return Ok(Arc::clone(class));
        }
        self.default_class
            .clone()
            .ok_or_else(|| PluginError::Missing(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl PluginSource for ClassRegistry {
    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn load_classes(&self) -> Box<dyn Iterator<Item = (String, Arc<BlockClass>)> + '_> {
        Box::new(
            self.classes
                .iter()
                .map(|(name, class)| (name.clone(), Arc::clone(class))),
        )
    }
}
