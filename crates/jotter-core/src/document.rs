//! # Note Documents
//!
//! The editor stores notes as a structured JSON tree. Storage never
//! interprets that tree; it searches the plain-text projection instead.
//!
//! ## Projection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {"type":"doc","content":[                                              │
//! │     {"type":"paragraph","content":[                                     │
//! │        {"type":"text","text":"Apple pie "},                             │
//! │        {"type":"tag","attrs":{"name":"dessert"}}]},                     │
//! │     {"type":"paragraph","content":[                                     │
//! │        {"type":"text","text":"Bake at 180C"}]}]}                        │
//! │       │                                                                 │
//! │       ▼  plain_text()                                                   │
//! │  "Apple pie #dessert\nBake at 180C"                                     │
//! │       │                                                                 │
//! │       ▼  extract_tag_names()                                            │
//! │  ["dessert"]                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::TagName;

/// Inline node types; everything else is treated as a block.
const INLINE_NODE_TYPES: &[&str] = &["text", "tag", "hardBreak", "mention", "emoji"];

/// `#name` preceded by start of text or whitespace.
static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)#([0-9A-Za-z_\-\p{Hiragana}\p{Katakana}\p{Han}ー々]+)")
        .expect("hashtag pattern is valid")
});

/// A structured editor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    /// An empty document, the content of a freshly created note.
    pub fn empty() -> Self {
        Document(json!({ "type": "doc", "content": [] }))
    }

    /// Wraps an editor JSON value as-is.
    pub fn from_json(value: Value) -> Self {
        Document(value)
    }

    /// Parses a stored JSON string.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Document)
    }

    /// Builds a document with one paragraph per line.
    pub fn from_plain_text(text: &str) -> Self {
        let paragraphs: Vec<Value> = text
            .lines()
            .map(|line| {
                if line.is_empty() {
                    json!({ "type": "paragraph" })
                } else {
                    json!({
                        "type": "paragraph",
                        "content": [{ "type": "text", "text": line }]
                    })
                }
            })
            .collect();

        Document(json!({ "type": "doc", "content": paragraphs }))
    }

    /// The underlying JSON value.
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Serializes to the compact JSON string stored by SQL backends.
    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    /// The plain-text projection used for full-text search.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        match &self.0 {
            Value::String(s) => out.push_str(s),
            node => collect_text(node, &mut out),
        }
        out.trim().to_string()
    }

    /// Tag names referenced by this document.
    pub fn tag_names(&self) -> Vec<TagName> {
        extract_tag_names(&self.plain_text())
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::empty()
    }
}

fn is_inline(node: &Value) -> bool {
    node.get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| INLINE_NODE_TYPES.contains(&t))
}

fn collect_text(node: &Value, out: &mut String) {
    match node.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        Some("tag") => {
            if let Some(name) = node.pointer("/attrs/name").and_then(Value::as_str) {
                if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push('#');
                out.push_str(name);
            }
        }
        Some("hardBreak") => out.push('\n'),
        _ => {
            let Some(children) = node.get("content").and_then(Value::as_array) else {
                return;
            };
            for child in children {
                if !is_inline(child) && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                collect_text(child, out);
            }
        }
    }
}

/// Extracts unique, valid tag names from plain text in first-seen order.
///
/// Tokens that do not form a valid [`TagName`] (too long, for instance) are
/// skipped.
pub fn extract_tag_names(text: &str) -> Vec<TagName> {
    let mut names: Vec<TagName> = Vec::new();
    for caps in HASHTAG_RE.captures_iter(text) {
        let Some(raw) = caps.get(1) else { continue };
        match TagName::parse(raw.as_str()) {
            Ok(name) => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            Err(err) => {
                tracing::debug!(token = raw.as_str(), error = %err, "Skipping tag token");
            }
        }
    }
    names
}

// =============================================================================
// Unit Tests
// =============================================================================
