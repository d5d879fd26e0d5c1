//! Wire-level delta model shared by the text store and editing widgets.
//!
//! A delta is an ordered sequence of [`DeltaOp`]s describing either the full
//! contents of a text (insert ops only) or a transformation of it
//! (retain/insert/delete). The serialized shape matches the editor wire
//! convention:
//!
//! ```json
//! [
//!   { "retain": 5 },
//!   { "insert": "hello", "attributes": { "bold": true } },
//!   { "delete": 2 }
//! ]
//! ```
//!
//! Attribute values are a closed set of booleans and strings. `false` and the
//! empty string count as "formatting off"; widgets use explicit `false` to
//! defeat their own formatting inheritance on freshly inserted text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use yrs::types::Attrs;
use yrs::Any;

/// A single formatting value carried by delta attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Str(String),
}

impl AttrValue {
    /// Widget truthiness: `false` and `""` mean the format is off.
    pub fn truthy(&self) -> bool {
        match self {
            AttrValue::Bool(b) => *b,
            AttrValue::Str(s) => !s.is_empty(),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Formatting attributes attached to an op, keyed by format name.
///
/// A `BTreeMap` keeps serialization deterministic.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Build an [`AttrMap`] from key/value pairs.
pub fn attrs<I, K, V>(entries: I) -> AttrMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<AttrValue>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// One delta operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeltaOp {
    Insert {
        insert: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        attributes: Option<AttrMap>,
    },
    Retain {
        retain: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        attributes: Option<AttrMap>,
    },
    Delete {
        delete: u32,
    },
}

impl DeltaOp {
    pub fn insert(text: impl Into<String>) -> Self {
        DeltaOp::Insert {
            insert: text.into(),
            attributes: None,
        }
    }

    pub fn insert_with(text: impl Into<String>, attributes: AttrMap) -> Self {
        DeltaOp::Insert {
            insert: text.into(),
            attributes: Some(attributes),
        }
    }

    pub fn retain(len: u32) -> Self {
        DeltaOp::Retain {
            retain: len,
            attributes: None,
        }
    }

    pub fn retain_with(len: u32, attributes: AttrMap) -> Self {
        DeltaOp::Retain {
            retain: len,
            attributes: Some(attributes),
        }
    }

    pub fn delete(len: u32) -> Self {
        DeltaOp::Delete { delete: len }
    }

    pub fn attributes(&self) -> Option<&AttrMap> {
        match self {
            DeltaOp::Insert { attributes, .. } | DeltaOp::Retain { attributes, .. } => {
                attributes.as_ref()
            }
            DeltaOp::Delete { .. } => None,
        }
    }

    pub fn insert_text(&self) -> Option<&str> {
        match self {
            DeltaOp::Insert { insert, .. } => Some(insert.as_str()),
            _ => None,
        }
    }
}

/// A single `(text, attributes)` run, the item type of list insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttrMap>,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: None,
        }
    }

    pub fn with_attributes(text: impl Into<String>, attributes: AttrMap) -> Self {
        Self {
            text: text.into(),
            attributes: Some(attributes),
        }
    }
}

/// Concatenation of every insert payload in `ops`.
pub fn delta_text(ops: &[DeltaOp]) -> String {
    let mut out = String::new();
    for op in ops {
        if let Some(text) = op.insert_text() {
            out.push_str(text);
        }
    }
    out
}

/// Strip the trailing newline run widgets append to document exports.
///
/// Editing widgets pad their documents with a final `"\n"`; when exporting a
/// widget delta for storage or comparison, that padding has to go. If the last
/// op is an attribute-less insert ending in a newline, all of its trailing
/// newlines are removed and the op is dropped entirely once emptied. An
/// attributed trailing newline is intentional content and is preserved.
pub fn normalize_widget_delta(mut ops: Vec<DeltaOp>) -> Vec<DeltaOp> {
    let trimmed = match ops.last() {
        Some(DeltaOp::Insert {
            insert,
            attributes: None,
        }) if insert.ends_with('\n') => Some(insert.trim_end_matches('\n').to_string()),
        _ => None,
    };
    if let Some(text) = trimmed {
        ops.pop();
        if !text.is_empty() {
            ops.push(DeltaOp::Insert {
                insert: text,
                attributes: None,
            });
        }
    }
    ops
}

// ---- conversions to and from the CRDT attribute representation ----

pub(crate) fn attr_value_to_any(value: &AttrValue) -> Any {
    match value {
        AttrValue::Bool(b) => Any::Bool(*b),
        AttrValue::Str(s) => Any::String(Arc::from(s.as_str())),
    }
}

pub(crate) fn any_to_attr_value(value: &Any) -> AttrValue {
    match value {
        Any::Bool(b) => AttrValue::Bool(*b),
        Any::String(s) => AttrValue::Str(s.to_string()),
        // values outside the wire model degrade to their string form
        other => AttrValue::Str(other.to_string()),
    }
}

pub(crate) fn attrs_to_yrs(map: &AttrMap) -> Attrs {
    map.iter()
        .map(|(k, v)| (Arc::from(k.as_str()), attr_value_to_any(v)))
        .collect()
}

pub(crate) fn attrs_from_yrs(attrs: &Attrs) -> AttrMap {
    attrs
        .iter()
        .map(|(k, v)| (k.to_string(), any_to_attr_value(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_value_truthiness() {
        assert!(AttrValue::Bool(true).truthy());
        assert!(!AttrValue::Bool(false).truthy());
        assert!(AttrValue::Str("https://example.com".into()).truthy());
        assert!(!AttrValue::Str("".into()).truthy());
    }

    #[test]
    fn test_delta_op_wire_shape() {
        let ops = vec![
            DeltaOp::retain(5),
            DeltaOp::insert_with("hello", attrs([("bold", true)])),
            DeltaOp::delete(2),
            DeltaOp::insert("plain"),
        ];
        let json = serde_json::to_string(&ops).unwrap();
        assert_eq!(
            json,
            r#"[{"retain":5},{"insert":"hello","attributes":{"bold":true}},{"delete":2},{"insert":"plain"}]"#
        );

        let back: Vec<DeltaOp> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ops);
    }

    #[test]
    fn test_attr_map_mixed_values_round_trip() {
        let map = attrs([
            ("bold", AttrValue::Bool(true)),
            ("link", AttrValue::Str("https://example.com".into())),
        ]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"bold":true,"link":"https://example.com"}"#);

        let back: AttrMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_delta_text_concatenates_inserts() {
        let ops = vec![
            DeltaOp::insert("Hello "),
            DeltaOp::retain(3),
            DeltaOp::insert_with("World", attrs([("bold", true)])),
            DeltaOp::delete(1),
        ];
        assert_eq!(delta_text(&ops), "Hello World");
    }

    #[test]
    fn test_insert_text_skips_non_inserts() {
        assert_eq!(DeltaOp::insert("ab").insert_text(), Some("ab"));
        assert_eq!(DeltaOp::retain(2).insert_text(), None);
        assert_eq!(DeltaOp::delete(1).insert_text(), None);
    }

    #[test]
    fn test_normalize_strips_single_trailing_newline() {
        let ops = vec![DeltaOp::insert("ab\n")];
        assert_eq!(normalize_widget_delta(ops), vec![DeltaOp::insert("ab")]);
    }

    #[test]
    fn test_normalize_strips_all_trailing_newlines() {
        let ops = vec![DeltaOp::insert("ab\n\n\n")];
        assert_eq!(normalize_widget_delta(ops), vec![DeltaOp::insert("ab")]);
    }

    #[test]
    fn test_normalize_drops_emptied_op() {
        let ops = vec![DeltaOp::insert("ab"), DeltaOp::insert("\n")];
        assert_eq!(normalize_widget_delta(ops), vec![DeltaOp::insert("ab")]);
    }

    #[test]
    fn test_normalize_keeps_attributed_newline() {
        let ops = vec![
            DeltaOp::insert("ab"),
            DeltaOp::insert_with("\n", attrs([("code", true)])),
        ];
        assert_eq!(normalize_widget_delta(ops.clone()), ops);
    }

    #[test]
    fn test_normalize_only_touches_last_op() {
        let ops = vec![DeltaOp::insert("a\n"), DeltaOp::insert("b")];
        assert_eq!(normalize_widget_delta(ops.clone()), ops);
    }

    #[test]
    fn test_yrs_attr_round_trip() {
        let map = attrs([
            ("bold", AttrValue::Bool(true)),
            ("link", AttrValue::Str("https://example.com".into())),
        ]);
        let yrs_attrs = attrs_to_yrs(&map);
        assert_eq!(attrs_from_yrs(&yrs_attrs), map);
    }

    #[test]
    fn test_untagged_retain_with_attributes() {
        let json = r#"{"retain":4,"attributes":{"italic":true}}"#;
        let op: DeltaOp = serde_json::from_str(json).unwrap();
        assert_eq!(op, DeltaOp::retain_with(4, attrs([("italic", true)])));
    }
}
