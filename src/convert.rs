//! Structural conversion of XML trees into generic documents
//!
//! Pure and deterministic: no I/O, no shared state. Each element is
//! processed in two passes. The first pass counts cleaned names across
//! attributes and element children; the second pass emits fields in
//! document order, promoting any name seen more than once to an array.

use indexmap::IndexMap;

use crate::document::{DocValue, Document};
use crate::markup::XmlNode;

/// Reserved field collecting the non-whitespace text segments of an element
/// that also has attributes or element children.
pub const TEXT_FIELD: &str = "_text";

/// Makes a raw XML name usable as a document-store field name: a leading
/// `$` gets an underscore prefix and every `.` becomes `_`.
pub fn clean_name(raw: &str) -> String {
    let prefixed = if raw.starts_with('$') {
        format!("_{raw}")
    } else {
        raw.to_string()
    };
    prefixed.replace('.', "_")
}

/// Converts a parsed XML tree into a generic document.
///
/// The root is normally an element; a bare text root converts to an empty
/// document.
pub fn convert(root: &XmlNode) -> Document {
    let mut doc = Document::new();
    if let XmlNode::Element {
        attributes,
        children,
        ..
    } = root
    {
        convert_into(&mut doc, attributes, children);
    }
    doc
}

fn convert_into(builder: &mut Document, attributes: &[(String, String)], children: &[XmlNode]) {
    // First pass: count cleaned names. Attributes and element children
    // share one counter per name, so a collision between the two merges
    // into a single array.
    let mut name_count: IndexMap<String, usize> = IndexMap::new();
    for (name, _) in attributes {
        *name_count.entry(clean_name(name)).or_insert(0) += 1;
    }
    for child in children {
        if let XmlNode::Element { name, .. } = child {
            *name_count.entry(clean_name(name)).or_insert(0) += 1;
        }
    }

    // Second pass: emit attributes first, then children, in document order.
    for (name, value) in attributes {
        emit(builder, &name_count, &clean_name(name), DocValue::scalar(value));
    }

    for child in children {
        match child {
            XmlNode::Text(data) => {
                let text = data.trim();
                if !text.is_empty() {
                    builder.append(TEXT_FIELD, DocValue::scalar(text));
                }
            }
            XmlNode::Element {
                name,
                attributes,
                children,
            } => {
                let value = if is_leaf_text(attributes, children) {
                    DocValue::scalar(leaf_text(children))
                } else {
                    let mut nested = Document::new();
                    convert_into(&mut nested, attributes, children);
                    DocValue::Document(nested)
                };
                emit(builder, &name_count, &clean_name(name), value);
            }
        }
    }
}

fn emit(builder: &mut Document, counts: &IndexMap<String, usize>, name: &str, value: DocValue) {
    // A field may already exist under a unique name when an attribute or
    // element is itself called `_text` and text segments got there first;
    // appending merges the values instead of clobbering the array.
    if counts.get(name).copied().unwrap_or(0) > 1 || builder.get(name).is_some() {
        builder.append(name, value);
    } else {
        builder.set(name, value);
    }
}

/// An element with no attributes and exactly one text child converts to a
/// scalar instead of a nested document.
fn is_leaf_text(attributes: &[(String, String)], children: &[XmlNode]) -> bool {
    attributes.is_empty() && children.len() == 1 && children[0].is_text()
}

fn leaf_text(children: &[XmlNode]) -> String {
    match children {
        [XmlNode::Text(data)] => data.trim().to_string(),
        _ => String::new(),
    }
}
