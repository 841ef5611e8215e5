//! Generic semi-structured documents: ordered field maps whose values are
//! string scalars, nested documents, or arrays. This is the output shape of
//! the XML conversion and the input shape of every sink.

use indexmap::IndexMap;
use serde::Serialize;

/// A single field value inside a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DocValue {
    Scalar(String),
    Document(Document),
    Array(Vec<DocValue>),
}

impl DocValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        DocValue::Scalar(value.into())
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            DocValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DocValue]> {
        match self {
            DocValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            DocValue::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

/// An ordered mapping from field name to value. Field order is insertion
/// order, which the converter arranges to match XML document order.
///
/// Invariant: a document never holds two fields with the same name. When a
/// name receives more than one value, [`Document::append`] merges them all
/// into a single array, keeping any value already stored under the name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Document {
    fields: IndexMap<String, DocValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field directly, replacing any previous value under the name.
    pub fn set(&mut self, name: impl Into<String>, value: DocValue) {
        self.fields.insert(name.into(), value);
    }

    /// Appends a value to the array field under `name`, creating the array
    /// at the current insertion position on first use. A non-array value
    /// already stored under the name is promoted into the array first, so
    /// no earlier value is ever dropped.
    pub fn append(&mut self, name: &str, value: DocValue) {
        let slot = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| DocValue::Array(Vec::new()));
        if !matches!(slot, DocValue::Array(_)) {
            let existing = std::mem::replace(slot, DocValue::Array(Vec::new()));
            if let DocValue::Array(items) = slot {
                items.push(existing);
            }
        }
        if let DocValue::Array(items) = slot {
            items.push(value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&DocValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
