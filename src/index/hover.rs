//! Hover normalization
//!
//! Hosts answer hover queries in several shapes: a bare string, a single
//! `{ value, ... }` record (`MarkupContent` or a `MarkedString` object), or
//! an array mixing both. [`NormalizedHover`] is the one shape we persist.

use lsp_types::Range;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::index::error::IndexError;

/// A hover exactly as the host returned it
///
/// `contents` stays untyped so shapes outside the protocol are detected at
/// normalization time instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hover {
    pub contents: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
}

#[cfg(test)]
impl Hover {
    pub fn new(contents: impl Into<Value>) -> Self {
        Self {
            contents: contents.into(),
            range: None,
        }
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }
}

/// `{ "value": ... }` with every other field dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoverRecord {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HoverItem {
    Plain(String),
    Record(HoverRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NormalizedHover {
    Plain(String),
    Record(HoverRecord),
    Sequence(Vec<HoverItem>),
}

impl HoverItem {
    fn decode(value: &Value) -> Result<Self, IndexError> {
        match value {
            Value::String(text) => Ok(Self::Plain(text.clone())),
            Value::Object(_) => decode_record(value).map(Self::Record),
            other => Err(IndexError::malformed_hover(format!(
                "unsupported item {}",
                shape_of(other)
            ))),
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Record(record) => &record.value,
        }
    }
}

impl NormalizedHover {
    /// The single place that inspects the shape of hover contents
    pub fn decode(contents: &Value) -> Result<Self, IndexError> {
        match contents {
            Value::String(text) => Ok(Self::Plain(text.clone())),
            Value::Object(_) => decode_record(contents).map(Self::Record),
            Value::Array(items) => items
                .iter()
                .map(HoverItem::decode)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Sequence),
            other => Err(IndexError::malformed_hover(format!(
                "unsupported contents {}",
                shape_of(other)
            ))),
        }
    }

    /// Human-readable text: sequences are joined with newlines
    pub fn render(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Record(record) => record.value.clone(),
            Self::Sequence(items) => items
                .iter()
                .map(HoverItem::text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn decode_record(value: &Value) -> Result<HoverRecord, IndexError> {
    match value.get("value") {
        Some(Value::String(text)) => Ok(HoverRecord {
            value: text.clone(),
        }),
        Some(other) => Err(IndexError::malformed_hover(format!(
            "record value is {}",
            shape_of(other)
        ))),
        None => Err(IndexError::malformed_hover("record has no value field")),
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn normalize_hover(hover: &Hover) -> Result<NormalizedHover, IndexError> {
    NormalizedHover::decode(&hover.contents)
}

/// Preview rendering; unrecognized shapes render as an empty string
pub fn render_hover(hover: &Hover) -> String {
    normalize_hover(hover)
        .map(|normalized| normalized.render())
        .unwrap_or_default()
}

/// A normalized hover plus the source range, when ranges are preserved
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedHover {
    pub contents: NormalizedHover,
    pub range: Option<Range>,
}

impl IndexedHover {
    pub fn new(contents: NormalizedHover, range: Option<Range>) -> Self {
        Self { contents, range }
    }
}

impl From<NormalizedHover> for IndexedHover {
    fn from(contents: NormalizedHover) -> Self {
        Self::new(contents, None)
    }
}

impl Serialize for IndexedHover {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.range {
            None => self.contents.serialize(serializer),
            Some(range) => {
                let mut state = serializer.serialize_struct("IndexedHover", 2)?;
                state.serialize_field("contents", &self.contents)?;
                state.serialize_field("range", range)?;
                state.end()
            }
        }
    }
}
