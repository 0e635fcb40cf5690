//! `MarkupNode` to indented XML text.

use super::MarkupNode;
use quick_xml::escape::escape;

const INDENT: &str = "  ";

pub(super) fn write_node(node: &MarkupNode) -> String {
    let mut out = String::new();
    write_element(node, 0, &mut out);
    out
}

fn write_element(node: &MarkupNode, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    out.push_str(&pad);
    out.push('<');
    out.push_str(&node.tag);
    for (name, value) in &node.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }

    match (node.text.as_deref(), node.children.is_empty()) {
        (None, true) => out.push_str("/>\n"),
        (Some(text), true) => {
            out.push('>');
            out.push_str(&escape(text));
            out.push_str("</");
            out.push_str(&node.tag);
            out.push_str(">\n");
        }
        (text, false) => {
            out.push_str(">\n");
            if let Some(text) = text {
                out.push_str(&pad);
                out.push_str(INDENT);
                push_cdata(text, out);
                out.push('\n');
            }
            for child in &node.children {
                write_element(child, depth + 1, out);
            }
            out.push_str(&pad);
            out.push_str("</");
            out.push_str(&node.tag);
            out.push_str(">\n");
        }
    }
}

/// Text beside child elements is written as CDATA; the reader drops only the
/// plain whitespace runs around it.
fn push_cdata(text: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]>");
}

#[cfg(test)]
mod tests {
    use crate::markup::{parse_str, MarkupNode};

    #[test]
    fn escapes_and_reads_back() {
        let mut root = MarkupNode::new("vertical");
        root.set_attribute("name", "A \"quoted\" <name>");
        let mut child = MarkupNode::new("html");
        child.text = Some("1 < 2 & 3".to_string());
        root.children.push(child);
        root.children.push(MarkupNode::pointer("video", "v1"));

        let text = root.to_xml_string();
        assert!(text.contains("&lt;name&gt;"));
        assert_eq!(parse_str(&text).expect("parse"), root);
    }

    #[test]
    fn empty_node_is_self_closing() {
        assert_eq!(MarkupNode::new("html").to_xml_string(), "<html/>\n");
    }

    #[test]
    fn empty_text_is_written_explicitly() {
        let mut node = MarkupNode::new("html");
        node.text = Some(String::new());
        let text = node.to_xml_string();
        assert_eq!(text, "<html></html>\n");
        assert_eq!(parse_str(&text).expect("parse"), node);
    }

    #[test]
    fn text_beside_children_keeps_its_whitespace() {
        let mut root = MarkupNode::new("html");
        root.text = Some("  padded ]]> body\n".to_string());
        root.children.push(MarkupNode::new("option:label"));

        let text = root.to_xml_string();
        assert_eq!(parse_str(&text).expect("parse"), root);
    }
}
