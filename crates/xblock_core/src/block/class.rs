//! Block class descriptors.
//!
//! # Responsibility
//! - Describe one block type: fields, frozen tags, handlers, views, services,
//!   child serialization policy and local resources.
//! - Merge base classes into a derived class at build time.
//!
//! # Invariants
//! - A class's tag set is the union of its own tags and every base's tags,
//!   computed once by `BlockClassBuilder::build` and never changed afterwards.
//! - Later declarations override earlier ones by name (fields, handlers, views).

use super::Block;
use crate::error::{BlockResult, ResourceError, ResourceResult};
use crate::fields::{base_fields, children_field, Field, FieldSet};
use crate::plugin::ENTRY_POINT;
use crate::resources::{check_local_resource_path, LocalResources};
use crate::runtime::Fragment;
use crate::serialization::ChildPolicy;
use crate::validation::Validation;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::sync::Arc;

static TAG_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\s]+").expect("valid tag separator regex"));

/// Opaque request payload passed to handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerRequest {
    /// Trailing path segment after the handler name, if any.
    pub suffix: String,
    pub body: Value,
}

impl HandlerRequest {
    pub fn new(body: Value) -> Self {
        Self {
            suffix: String::new(),
            body,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }
}

pub type HandlerFn = Arc<dyn Fn(&mut Block, &HandlerRequest) -> BlockResult<Value> + Send + Sync>;
pub type FallbackHandlerFn =
    Arc<dyn Fn(&mut Block, &str, &HandlerRequest) -> BlockResult<Value> + Send + Sync>;
pub type ViewFn = Arc<dyn Fn(&mut Block, &Value) -> BlockResult<Fragment> + Send + Sync>;
pub type ValidatorFn = Arc<dyn Fn(&mut Block, &mut Validation) -> BlockResult<()> + Send + Sync>;

/// Frozen type descriptor shared by every instance of one block type.
pub struct BlockClass {
    name: String,
    family: String,
    fields: Arc<FieldSet>,
    tags: BTreeSet<String>,
    handlers: BTreeMap<String, HandlerFn>,
    fallback_handler: Option<FallbackHandlerFn>,
    views: BTreeMap<String, ViewFn>,
    needs: BTreeSet<String>,
    wants: BTreeSet<String>,
    has_children: bool,
    child_policy: ChildPolicy,
    validator: Option<ValidatorFn>,
    resources: Option<Arc<dyn LocalResources>>,
}

impl BlockClass {
    pub fn builder(name: impl Into<String>) -> BlockClassBuilder {
        BlockClassBuilder::new(name)
    }

    /// Block type name, also the markup tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin entry-point category.
    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn fields(&self) -> &Arc<FieldSet> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn handler(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.get(name).cloned()
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn fallback_handler(&self) -> Option<FallbackHandlerFn> {
        self.fallback_handler.clone()
    }

    pub fn view(&self, name: &str) -> Option<ViewFn> {
        self.views.get(name).cloned()
    }

    pub fn needs_service(&self, name: &str) -> bool {
        self.needs.contains(name)
    }

    pub fn wants_service(&self, name: &str) -> bool {
        self.wants.contains(name)
    }

    pub fn has_children(&self) -> bool {
        self.has_children
    }

    pub fn child_policy(&self) -> ChildPolicy {
        self.child_policy
    }

    pub fn validator(&self) -> Option<ValidatorFn> {
        self.validator.clone()
    }

    /// Opens a packaged resource of this class.
    ///
    /// Only paths under `public/` with no dot-prefixed segment are served.
    pub fn open_local_resource(&self, uri: &str) -> ResourceResult<Box<dyn Read + Send>> {
        check_local_resource_path(uri)?;
        match &self.resources {
            Some(resources) => resources.open(uri),
            None => Err(ResourceError::NotFound(uri.to_string())),
        }
    }
}

impl Debug for BlockClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockClass")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("fields", &self.fields.names())
            .field("tags", &self.tags)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .field("has_children", &self.has_children)
            .field("child_policy", &self.child_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for `BlockClass`.
pub struct BlockClassBuilder {
    name: String,
    family: String,
    fields: FieldSet,
    declared_fields: BTreeSet<String>,
    tags: BTreeSet<String>,
    handlers: BTreeMap<String, HandlerFn>,
    fallback_handler: Option<FallbackHandlerFn>,
    views: BTreeMap<String, ViewFn>,
    needs: BTreeSet<String>,
    wants: BTreeSet<String>,
    has_children: bool,
    child_policy: Option<ChildPolicy>,
    validator: Option<ValidatorFn>,
    resources: Option<Arc<dyn LocalResources>>,
}

impl BlockClassBuilder {
    /// Starts a class with the base fields every block has.
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = FieldSet::new();
        for field in base_fields() {
            fields.insert(field);
        }
        Self {
            name: name.into(),
            family: ENTRY_POINT.to_string(),
            fields,
            declared_fields: BTreeSet::new(),
            tags: BTreeSet::new(),
            handlers: BTreeMap::new(),
            fallback_handler: None,
            views: BTreeMap::new(),
            needs: BTreeSet::new(),
            wants: BTreeSet::new(),
            has_children: false,
            child_policy: None,
            validator: None,
            resources: None,
        }
    }

    /// Inherits what `base` declares and this builder has not.
    ///
    /// Declarations win over inheritance regardless of call order; with
    /// several bases the first one that declares something wins.
    pub fn extends(mut self, base: &BlockClass) -> Self {
        for field in base.fields.iter() {
            if !self.declared_fields.contains(field.name()) {
                self.declared_fields.insert(field.name().to_string());
                self.fields.insert(field.clone());
            }
        }
        self.tags.extend(base.tags.iter().cloned());
        for (name, handler) in &base.handlers {
            self.handlers
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(handler));
        }
        if self.fallback_handler.is_none() {
            self.fallback_handler = base.fallback_handler.clone();
        }
        for (name, view) in &base.views {
            self.views
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(view));
        }
        self.needs.extend(base.needs.iter().cloned());
        self.wants.extend(base.wants.iter().cloned());
        self.has_children |= base.has_children;
        if self.child_policy.is_none() {
            self.child_policy = Some(base.child_policy);
        }
        if self.validator.is_none() {
            self.validator = base.validator.clone();
        }
        if self.resources.is_none() {
            self.resources = base.resources.clone();
        }
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.declared_fields.insert(field.name().to_string());
        self.fields.insert(field);
        self
    }

    /// Adds class tags; `spec` is split on commas and whitespace.
    pub fn tag(mut self, spec: &str) -> Self {
        self.tags.extend(
            TAG_SEPARATOR_RE
                .split(spec)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string),
        );
        self
    }

    pub fn handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Block, &HandlerRequest) -> BlockResult<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Handler invoked with the requested name when no exact match exists.
    pub fn fallback_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Block, &str, &HandlerRequest) -> BlockResult<Value> + Send + Sync + 'static,
    {
        self.fallback_handler = Some(Arc::new(handler));
        self
    }

    pub fn view<F>(mut self, name: impl Into<String>, view: F) -> Self
    where
        F: Fn(&mut Block, &Value) -> BlockResult<Fragment> + Send + Sync + 'static,
    {
        self.views.insert(name.into(), Arc::new(view));
        self
    }

    pub fn needs(mut self, service: impl Into<String>) -> Self {
        self.needs.insert(service.into());
        self
    }

    pub fn wants(mut self, service: impl Into<String>) -> Self {
        self.wants.insert(service.into());
        self
    }

    pub fn has_children(mut self, has_children: bool) -> Self {
        self.has_children = has_children;
        self
    }

    pub fn child_policy(mut self, policy: ChildPolicy) -> Self {
        self.child_policy = Some(policy);
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&mut Block, &mut Validation) -> BlockResult<()> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn resources(mut self, resources: Arc<dyn LocalResources>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Freezes the class.
    pub fn build(mut self) -> Arc<BlockClass> {
        if self.has_children && !self.fields.contains(crate::fields::CHILDREN_FIELD) {
            self.fields.insert(children_field());
        }
        Arc::new(BlockClass {
            name: self.name,
            family: self.family,
            fields: Arc::new(self.fields),
            tags: self.tags,
            handlers: self.handlers,
            fallback_handler: self.fallback_handler,
            views: self.views,
            needs: self.needs,
            wants: self.wants,
            has_children: self.has_children,
            child_policy: self.child_policy.unwrap_or_default(),
            validator: self.validator,
            resources: self.resources,
        })
    }
}
