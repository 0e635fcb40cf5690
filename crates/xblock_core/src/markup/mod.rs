//! In-memory markup tree and its XML text codec.
//!
//! # Responsibility
//! - Hold serialized block state as a plain tree: tag, ordered attributes,
//!   child nodes and optional text.
//! - Read and write XML text without interpreting block semantics.
//!
//! # Invariants
//! - Attribute order is preserved; setting an existing attribute replaces its
//!   value in place.
//! - Qualified names (`option:foo`, `xmlns:block`) are kept verbatim.
//! - Text survives write then read unchanged, including surrounding
//!   whitespace and the empty string.

mod reader;
mod writer;

pub use reader::{parse_fragments, parse_str};

/// Attribute naming the definition a pointer node refers to.
pub const URL_NAME_ATTRIBUTE: &str = "url_name";

/// One element of a markup tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
    pub text: Option<String>,
}

impl MarkupNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Reference node naming another document by `url_name`.
    pub fn pointer(tag: impl Into<String>, url_name: impl Into<String>) -> Self {
        let mut node = Self::new(tag);
        node.attributes
            .push((URL_NAME_ATTRIBUTE.to_string(), url_name.into()));
        node
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    /// Whether this node only names another document.
    ///
    /// A pointer has `url_name` as its sole non-metadata attribute and carries
    /// neither children nor text.
    pub fn is_pointer(&self) -> bool {
        let mut names = self
            .attributes
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| !is_metadata_attribute(name));
        names.next() == Some(URL_NAME_ATTRIBUTE)
            && names.next().is_none()
            && self.children.is_empty()
            && self.text.as_deref().map_or(true, |text| text.trim().is_empty())
    }

    /// Indented XML text for this node and its subtree.
    pub fn to_xml_string(&self) -> String {
        writer::write_node(self)
    }
}

/// Namespace declarations and `block:*` metadata never map to fields.
pub fn is_metadata_attribute(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:") || name.starts_with("block:")
}
