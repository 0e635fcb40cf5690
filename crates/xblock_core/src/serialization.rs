//! Block state to and from markup trees.
//!
//! # Responsibility
//! - Export a block's non-default fields and its children into a
//!   `MarkupNode`, inline or as pointer references.
//! - Build blocks from markup through the runtime factory, recursing into
//!   children in document order.
//!
//! # Invariants
//! - `parent` and `children` are structural and never written as attributes.
//! - Attributes that match no field are preserved and re-exported verbatim.
//! - A malformed field value aborts its own node only; forest parsing keeps
//!   going with the siblings.
//! - A parsed child is saved with its parent pointer before the parent lists it.
//! - A parse that fails anywhere in a subtree saves none of it. Ids handed
//!   out by the id generator for the failed subtree stay allocated.

use crate::block::{Block, BlockClass};
use crate::error::{BlockError, BlockResult, XmlError, XmlResult};
use crate::fields::{Field, Scope, ScopeIds, CHILDREN_FIELD, CONTENT_FIELD, PARENT_FIELD};
use crate::markup::{self, is_metadata_attribute, MarkupNode, URL_NAME_ATTRIBUTE};
use crate::runtime::Runtime;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const OPTION_NAMESPACE: &str = "http://code.edx.org/xblock/option";
pub const BLOCK_NAMESPACE: &str = "http://code.edx.org/xblock/block";

const OPTION_PREFIX: &str = "option:";
const XMLNS_OPTION: &str = "xmlns:option";
const XMLNS_BLOCK: &str = "xmlns:block";
const BLOCK_FAMILY_ATTRIBUTE: &str = "block:family";
const NONE_ATTRIBUTE: &str = "none";

/// How a container writes its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildPolicy {
    /// Children are nested in the parent's node.
    #[default]
    Inline,
    /// Children become `<type url_name=".."/>` references; full nodes are
    /// collected in the `ExportContext`.
    Pointer,
}

/// What export does with a child id the runtime cannot resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildResolution {
    #[default]
    Strict,
    /// Skip the child and log a warning.
    Lenient,
}

/// Full markup of a child written as a pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerDocument {
    pub block_type: String,
    pub url_name: String,
    pub node: MarkupNode,
}

/// State carried through one export walk.
#[derive(Debug, Clone, Default)]
pub struct ExportContext {
    resolution: ChildResolution,
    pointers: Vec<PointerDocument>,
}

impl ExportContext {
    pub fn new(resolution: ChildResolution) -> Self {
        Self {
            resolution,
            pointers: Vec::new(),
        }
    }

    pub fn resolution(&self) -> ChildResolution {
        self.resolution
    }

    /// Pointer documents collected so far, in export order.
    pub fn pointers(&self) -> &[PointerDocument] {
        &self.pointers
    }

    pub fn into_pointers(self) -> Vec<PointerDocument> {
        self.pointers
    }
}

/// Loads the markup a pointer node refers to.
pub trait PointerResolver: Send + Sync {
    fn load(&self, block_type: &str, url_name: &str) -> XmlResult<String>;
}

/// Pointer documents held in memory, keyed by `(block_type, url_name)`.
#[derive(Debug, Default)]
pub struct MemoryPointerStore {
    documents: Mutex<BTreeMap<(String, String), String>>,
}

impl MemoryPointerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, block_type: &str, url_name: &str, text: String) -> XmlResult<()> {
        let mut documents = self.documents.lock().map_err(|_| XmlError::Pointer {
            block_type: block_type.to_string(),
            url_name: url_name.to_string(),
            message: "pointer store lock poisoned".to_string(),
        })?;
        documents.insert((block_type.to_string(), url_name.to_string()), text);
        Ok(())
    }

    /// Stores every pointer document an export collected.
    pub fn publish(&self, pointers: &[PointerDocument]) -> XmlResult<usize> {
        for pointer in pointers {
            self.insert(
                &pointer.block_type,
                &pointer.url_name,
                pointer.node.to_xml_string(),
            )?;
        }
        Ok(pointers.len())
    }
}

impl PointerResolver for MemoryPointerStore {
    fn load(&self, block_type: &str, url_name: &str) -> XmlResult<String> {
        let pointer_error = |message: &str| XmlError::Pointer {
            block_type: block_type.to_string(),
            url_name: url_name.to_string(),
            message: message.to_string(),
        };
        let documents = self
            .documents
            .lock()
            .map_err(|_| pointer_error("pointer store lock poisoned"))?;
        documents
            .get(&(block_type.to_string(), url_name.to_string()))
            .cloned()
            .ok_or_else(|| pointer_error("no such document"))
    }
}

impl Block {
    /// Writes this block's state and children into `node`.
    pub fn add_xml_to_node(
        &mut self,
        node: &mut MarkupNode,
        context: &mut ExportContext,
    ) -> BlockResult<()> {
        let class = Arc::clone(self.class());
        node.tag = self.block_type().to_string();
        node.set_attribute(XMLNS_OPTION, OPTION_NAMESPACE);
        node.set_attribute(XMLNS_BLOCK, BLOCK_NAMESPACE);
        node.set_attribute(BLOCK_FAMILY_ATTRIBUTE, class.family());

        for field in class.fields().iter() {
            if is_structural(field) {
                continue;
            }
            let value = self.get(field.name())?;
            if !field.is_force_export() && field.is_default(&value) {
                continue;
            }
            write_field(node, field, &value);
        }
        for (name, value) in self.extra_attributes() {
            node.set_attribute(name, value);
        }

        if class.has_children() {
            for child_id in self.children_ids()? {
                let mut child = match self.runtime().get_block(&child_id) {
                    Ok(child) => child,
                    Err(BlockError::Runtime(err))
                        if context.resolution == ChildResolution::Lenient =>
                    {
                        warn!(
                            "event=block_export module=serialization status=child_skipped block={} child={} error={}",
                            self.usage_id(),
                            child_id,
                            err
                        );
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                let mut child_node = MarkupNode::new(child.block_type());
                child.add_xml_to_node(&mut child_node, context)?;
                match class.child_policy() {
                    ChildPolicy::Inline => node.children.push(child_node),
                    ChildPolicy::Pointer => {
                        let url_name = child.scope_ids().def_id().to_string();
                        node.children
                            .push(MarkupNode::pointer(child.block_type(), url_name.clone()));
                        context.pointers.push(PointerDocument {
                            block_type: child.block_type().to_string(),
                            url_name,
                            node: child_node,
                        });
                    }
                }
            }
        }

        debug!(
            "event=block_export module=serialization status=ok block_type={} block={} children={}",
            self.block_type(),
            self.usage_id(),
            node.children.len()
        );
        Ok(())
    }

    /// Fresh node for this block.
    pub fn to_markup(&mut self, context: &mut ExportContext) -> BlockResult<MarkupNode> {
        let mut node = MarkupNode::new(self.block_type());
        self.add_xml_to_node(&mut node, context)?;
        Ok(node)
    }

    /// Constructs a block of `class` and populates it from `node`.
    ///
    /// Children are parsed and appended in document order and saved once the
    /// whole subtree has parsed. The returned block itself is not saved.
    pub fn parse_xml(
        runtime: &dyn Runtime,
        class: Arc<BlockClass>,
        node: &MarkupNode,
        scope_ids: ScopeIds,
    ) -> BlockResult<Block> {
        let mut pending = Vec::new();
        let block = populate(runtime, class, node, scope_ids, &mut pending)?;
        save_parsed(&mut pending)?;
        Ok(block)
    }
}

/// Fills a new block from `node`; parsed children are queued in `pending`
/// instead of being saved.
fn populate(
    runtime: &dyn Runtime,
    class: Arc<BlockClass>,
    node: &MarkupNode,
    scope_ids: ScopeIds,
    pending: &mut Vec<Block>,
) -> BlockResult<Block> {
    let mut block = runtime.construct_block(Arc::clone(&class), scope_ids)?;
    let field_error = |source| XmlError::Field {
        tag: node.tag.clone(),
        source,
    };

    for (name, raw) in &node.attributes {
        if is_metadata_attribute(name) || name == URL_NAME_ATTRIBUTE {
            continue;
        }
        match class.fields().by_serialized_name(name) {
            Some(field) if !is_structural(field) => {
                let value = field.from_markup(raw).map_err(field_error)?;
                block.set(field.name(), value).map_err(field_error)?;
            }
            _ => block.preserve_attribute(name, raw),
        }
    }

    for child in &node.children {
        if let Some(option_name) = child.tag.strip_prefix(OPTION_PREFIX) {
            let Some(field) = class.fields().by_serialized_name(option_name) else {
                warn!(
                    "event=block_parse module=serialization status=unknown_option block_type={} option={}",
                    class.name(),
                    option_name
                );
                continue;
            };
            let value = if child.attribute(NONE_ATTRIBUTE) == Some("true") {
                Value::Null
            } else {
                field
                    .from_markup(child.text.as_deref().unwrap_or_default())
                    .map_err(field_error)?
            };
            block.set(field.name(), value).map_err(field_error)?;
            continue;
        }

        let child_id = build(runtime, child, Some(block.usage_id()), pending)?;
        block.add_child(&child_id)?;
    }

    if let Some(text) = node.text.as_deref() {
        match class.field(CONTENT_FIELD) {
            Some(field) if field.scope() == Scope::Content => {
                let value = field.from_markup(text).map_err(field_error)?;
                block.set(CONTENT_FIELD, value).map_err(field_error)?;
            }
            _ if text.trim().is_empty() => {}
            _ => debug!(
                "event=block_parse module=serialization status=text_ignored block_type={}",
                class.name()
            ),
        }
    }
    Ok(block)
}

/// Builds, saves and returns the usage id of the block `node` describes.
///
/// Pointer nodes are dereferenced through the runtime's `PointerResolver`
/// first; their `url_name` becomes the definition slug. Nothing is saved
/// unless the whole subtree parses.
pub fn parse_node(
    runtime: &dyn Runtime,
    node: &MarkupNode,
    parent_id: Option<&str>,
) -> BlockResult<String> {
    let mut pending = Vec::new();
    let usage_id = build(runtime, node, parent_id, &mut pending)?;
    save_parsed(&mut pending)?;
    Ok(usage_id)
}

/// Parses a single-rooted XML document into a saved block tree.
pub fn parse_xml_str(runtime: &dyn Runtime, text: &str) -> BlockResult<String> {
    let node = markup::parse_str(text)?;
    parse_node(runtime, &node, None)
}

/// Parses each top-level node independently.
pub fn parse_xml_forest(runtime: &dyn Runtime, nodes: &[MarkupNode]) -> Vec<BlockResult<String>> {
    nodes
        .iter()
        .map(|node| parse_node(runtime, node, None))
        .collect()
}

/// XML text for `block` and its inline children.
pub fn export_xml(block: &mut Block, context: &mut ExportContext) -> BlockResult<String> {
    Ok(block.to_markup(context)?.to_xml_string())
}

fn build(
    runtime: &dyn Runtime,
    node: &MarkupNode,
    parent_id: Option<&str>,
    pending: &mut Vec<Block>,
) -> BlockResult<String> {
    if node.is_pointer() {
        let loaded = load_pointer(runtime, node)?;
        return instantiate(runtime, &loaded, node.attribute(URL_NAME_ATTRIBUTE), parent_id, pending);
    }
    instantiate(runtime, node, node.attribute(URL_NAME_ATTRIBUTE), parent_id, pending)
}

fn instantiate(
    runtime: &dyn Runtime,
    node: &MarkupNode,
    url_name: Option<&str>,
    parent_id: Option<&str>,
    pending: &mut Vec<Block>,
) -> BlockResult<String> {
    let class = runtime.load_block_type(&node.tag)?;
    let ids = runtime.id_generator();
    let def_id = ids.create_definition(&node.tag, url_name)?;
    let usage_id = ids.create_usage(&def_id)?;
    let scope_ids = ScopeIds::new(
        runtime.user_id().map(str::to_string),
        node.tag.clone(),
        def_id,
        usage_id,
    );

    let mut block = match populate(runtime, class, node, scope_ids, pending) {
        Ok(block) => block,
        Err(err) => {
            warn!(
                "event=block_parse module=serialization status=error block_type={} error={}",
                node.tag, err
            );
            return Err(err);
        }
    };
    if parent_id.is_some() {
        block.set_parent(parent_id)?;
    }
    let usage_id = block.usage_id().to_string();
    pending.push(block);
    Ok(usage_id)
}

/// Saves a parsed subtree; children precede their parent in `pending`.
fn save_parsed(pending: &mut [Block]) -> BlockResult<()> {
    for block in pending.iter_mut() {
        block.save()?;
        info!(
            "event=block_parse module=serialization status=ok block_type={} block={}",
            block.block_type(),
            block.usage_id()
        );
    }
    Ok(())
}

fn load_pointer(runtime: &dyn Runtime, node: &MarkupNode) -> BlockResult<MarkupNode> {
    let url_name = node.attribute(URL_NAME_ATTRIBUTE).unwrap_or_default();
    let pointer_error = |message: String| XmlError::Pointer {
        block_type: node.tag.clone(),
        url_name: url_name.to_string(),
        message,
    };

    let resolver = runtime
        .pointer_resolver()
        .ok_or_else(|| pointer_error("runtime has no pointer resolver".to_string()))?;
    let text = resolver.load(&node.tag, url_name)?;
    let loaded = markup::parse_str(&text).map_err(|err| pointer_error(err.to_string()))?;
    if loaded.tag != node.tag {
        return Err(pointer_error(format!("document describes <{}>", loaded.tag)).into());
    }
    Ok(loaded)
}

fn is_structural(field: &Field) -> bool {
    field.name() == PARENT_FIELD || field.name() == CHILDREN_FIELD
}

fn write_field(node: &mut MarkupNode, field: &Field, value: &Value) {
    if field.name() == CONTENT_FIELD && field.scope() == Scope::Content {
        node.text = field.to_markup(value);
        return;
    }

    if value.is_null() {
        if field.is_none_to_xml() {
            let mut element = MarkupNode::new(format!("{OPTION_PREFIX}{}", field.serialized_name()));
            element.set_attribute(NONE_ATTRIBUTE, "true");
            node.children.push(element);
        }
        return;
    }

    let Some(text) = field.to_markup(value) else {
        return;
    };
    if field.is_xml_node() {
        let mut element = MarkupNode::new(format!("{OPTION_PREFIX}{}", field.serialized_name()));
        element.text = Some(text);
        node.children.push(element);
    } else {
        node.set_attribute(field.serialized_name(), &text);
    }
}
