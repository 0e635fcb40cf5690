//! XML text to `MarkupNode` via `quick-xml`.

use super::MarkupNode;
use crate::error::{XmlError, XmlResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Display;

/// Parses a document with exactly one root element.
pub fn parse_str(text: &str) -> XmlResult<MarkupNode> {
    let mut roots = parse_fragments(text)?;
    match roots.len() {
        1 => Ok(roots.remove(0)),
        0 => Err(XmlError::Syntax("document has no root element".to_string())),
        count => Err(XmlError::Syntax(format!(
            "document has {count} root elements, expected one"
        ))),
    }
}

/// Parses zero or more sibling top-level elements.
///
/// Comments, declarations, doctypes and processing instructions are skipped.
/// Text outside any element is rejected unless it is whitespace.
///
/// Text is kept verbatim. Whitespace-only runs are dropped only from elements
/// that have child elements; CDATA runs are always kept. An element written as
/// `<a></a>` has `Some("")` text, `<a/>` has `None`.
pub fn parse_fragments(text: &str) -> XmlResult<Vec<MarkupNode>> {
    let mut reader = Reader::from_str(text);
    let mut roots = Vec::new();
    let mut open: Vec<OpenElement> = Vec::new();
    loop {
        let event = reader
            .read_event()
            .map_err(|err| syntax(reader.buffer_position(), err))?;
        match event {
            Event::Start(start) => open.push(OpenElement::new(element(&start)?)),
            Event::Empty(start) => {
                let node = element(&start)?;
                attach(&mut open, &mut roots, node);
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                let Some(closed) = open.pop() else {
                    return Err(XmlError::Syntax(format!("unexpected </{name}>")));
                };
                if closed.node.tag != name {
                    return Err(XmlError::Syntax(format!(
                        "expected </{}>, found </{name}>",
                        closed.node.tag
                    )));
                }
                attach(&mut open, &mut roots, closed.finish());
            }
            Event::Text(content) => {
                let value = content
                    .unescape()
                    .map_err(|err| syntax(reader.buffer_position(), err))?;
                push_text(&mut open, &value, false)?;
            }
            Event::CData(content) => {
                let value = String::from_utf8_lossy(&content.into_inner()).into_owned();
                push_text(&mut open, &value, true)?;
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(XmlError::Syntax(format!("unclosed <{}>", unclosed.node.tag)));
    }
    Ok(roots)
}

/// An element whose end tag has not been seen yet.
struct OpenElement {
    node: MarkupNode,
    runs: Vec<TextRun>,
}

struct TextRun {
    text: String,
    cdata: bool,
}

impl OpenElement {
    fn new(node: MarkupNode) -> Self {
        Self {
            node,
            runs: Vec::new(),
        }
    }

    fn finish(mut self) -> MarkupNode {
        if self.node.children.is_empty() {
            self.node.text = Some(self.runs.iter().map(|run| run.text.as_str()).collect());
            return self.node;
        }
        let kept: Vec<&str> = self
            .runs
            .iter()
            .filter(|run| run.cdata || !run.text.trim().is_empty())
            .map(|run| run.text.as_str())
            .collect();
        if !kept.is_empty() {
            self.node.text = Some(kept.concat());
        }
        self.node
    }
}

fn element(start: &BytesStart<'_>) -> XmlResult<MarkupNode> {
    let mut node = MarkupNode::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| XmlError::Syntax(err.to_string()))?;
        let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| XmlError::Syntax(format!("attribute `{name}`: {err}")))?;
        node.attributes.push((name, value.into_owned()));
    }
    Ok(node)
}

fn attach(open: &mut [OpenElement], roots: &mut Vec<MarkupNode>, node: MarkupNode) {
    match open.last_mut() {
        Some(parent) => parent.node.children.push(node),
        None => roots.push(node),
    }
}

fn push_text(open: &mut [OpenElement], value: &str, cdata: bool) -> XmlResult<()> {
    let Some(current) = open.last_mut() else {
        if !cdata && value.trim().is_empty() {
            return Ok(());
        }
        return Err(XmlError::Syntax("text outside of any element".to_string()));
    };
    current.runs.push(TextRun {
        text: value.to_string(),
        cdata,
    });
    Ok(())
}

fn syntax(position: impl Display, err: impl Display) -> XmlError {
    XmlError::Syntax(format!("at byte {position}: {err}"))
}
