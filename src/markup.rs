//! In-memory XML tree parsing
//!
//! Builds a full node tree per input unit (one file or one line) using
//! quick-xml's pull parser. Whitespace text nodes are kept as-is; deciding
//! what to do with them is the converter's job.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A parsed node from the source XML tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element {
        name: String,
        /// Name/value pairs in document order.
        attributes: Vec<(String, String)>,
        /// Child nodes in document order, including whitespace text.
        children: Vec<XmlNode>,
    },
    Text(String),
}

impl XmlNode {
    pub fn text(data: impl Into<String>) -> Self {
        XmlNode::Text(data.into())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, XmlNode::Text(_))
    }
}

/// An element whose closing tag has not been seen yet.
struct OpenElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl OpenElement {
    fn from_start(start: &BytesStart) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.with_context(|| format!("malformed attribute in <{}>", name))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .with_context(|| format!("malformed attribute value in <{}>", name))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    fn into_node(self) -> XmlNode {
        XmlNode::Element {
            name: self.name,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

/// Parses a complete XML document from a string into its node tree.
pub fn parse_str(input: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed XML near byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(start) => {
                stack.push(OpenElement::from_start(&start)?);
            }
            Event::Empty(start) => {
                let node = OpenElement::from_start(&start)?.into_node();
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                // The reader validates tag nesting, so End always matches
                // the innermost open element.
                let done = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unexpected closing tag"))?;
                attach(&mut stack, &mut root, done.into_node())?;
            }
            Event::Text(text) => {
                let data = text.unescape().context("malformed text content")?.into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(data));
                } else if !data.trim().is_empty() {
                    bail!("text content outside of the document root");
                }
            }
            Event::CData(cdata) => {
                let data = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(data));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            // carry nothing the conversion cares about.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        bail!("unclosed element <{}>", open.name);
    }

    root.ok_or_else(|| anyhow!("no root element found"))
}

/// Parses one XML document per file.
pub fn parse_file(path: &Path) -> Result<XmlNode> {
    let input = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    parse_str(&input).with_context(|| format!("failed to parse '{}'", path.display()))
}

fn attach(stack: &mut Vec<OpenElement>, root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_some() {
        bail!("multiple root elements");
    } else {
        *root = Some(node);
    }
    Ok(())
}
