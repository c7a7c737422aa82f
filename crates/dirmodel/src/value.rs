//! Attribute kinds and typed values
//!
//! Every directory-backed attribute is declared with a kind that fixes its
//! value shape in memory and its coercion rules on assignment. Booleans are
//! backed by the directory's canonical `TRUE`/`FALSE` text and only
//! canonicalized back to text at diff time, so repeated identical logical
//! assignments never register as changes.

use base64::Engine;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::error::{ModelError, ModelResult};

/// Canonical directory text for a true boolean attribute.
pub const BOOLEAN_TRUE: &str = "TRUE";

/// Canonical directory text for a false boolean attribute.
pub const BOOLEAN_FALSE: &str = "FALSE";

/// The declared value-shape category of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// Single textual value; multi-valued records stay lists.
    Text,
    /// Always a list, even when the record stores a single value.
    Sequence,
    /// Raw byte payload, never decoded as text.
    Binary,
    /// Logical value backed by canonical `TRUE`/`FALSE` text.
    Boolean,
    /// Derived on read only; no directory backing, never diffed or written.
    Computed,
}

impl AttrKind {
    /// Stable lowercase name, used in messages and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::Text => "text",
            AttrKind::Sequence => "sequence",
            AttrKind::Binary => "binary",
            AttrKind::Boolean => "boolean",
            AttrKind::Computed => "computed",
        }
    }
}

impl std::fmt::Display for AttrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value held by an entry.
///
/// Absence is modelled outside this enum (`Option<Value>`); blank text
/// normalizes to absence before a `Value` is ever stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Seq(Vec<String>),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl Value {
    /// Canonical directory text for a logical boolean.
    pub fn canonical_bool_text(flag: bool) -> &'static str {
        if flag {
            BOOLEAN_TRUE
        } else {
            BOOLEAN_FALSE
        }
    }

    /// An empty sequence carries no values and counts as absent when
    /// computing diff operations.
    pub fn is_effectively_absent(&self) -> bool {
        matches!(self, Value::Seq(items) if items.is_empty())
    }

    /// Raw byte values as sent on the wire for add/modify operations.
    pub fn wire_values(&self) -> Vec<Vec<u8>> {
        match self {
            Value::Text(s) => vec![s.clone().into_bytes()],
            Value::Seq(items) => items.iter().map(|s| s.clone().into_bytes()).collect(),
            Value::Bytes(b) => vec![b.clone()],
            Value::Bool(flag) => vec![Self::canonical_bool_text(*flag).as_bytes().to_vec()],
        }
    }

    /// JSON representation for export: binary values become base64 text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(s) => json!(s),
            Value::Seq(items) => json!(items),
            Value::Bytes(b) => json!(base64::engine::general_purpose::STANDARD.encode(b)),
            Value::Bool(flag) => json!(flag),
        }
    }

    /// JSON representation safe for logs and events: binary values are
    /// replaced by an irreversible content-hash marker.
    pub fn to_loggable_json(&self) -> serde_json::Value {
        match self {
            Value::Bytes(b) => json!(binary_marker(b)),
            other => other.to_json(),
        }
    }
}

/// Content-hash marker standing in for a binary payload in logs and events.
pub fn binary_marker(bytes: &[u8]) -> String {
    format!("[binary sha256:{}]", hex::encode(Sha256::digest(bytes)))
}

/// Replace logical booleans with their canonical directory text.
///
/// Applied to change-log snapshots only, so assignment-time comparisons see
/// the logical value.
pub(crate) fn canonicalize_bool(value: Value) -> Value {
    match value {
        Value::Bool(flag) => Value::Text(Value::canonical_bool_text(flag).to_string()),
        other => other,
    }
}

/// Blank text (empty or whitespace-only) normalizes to absence.
pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Unordered comparison for sequence values. Directory attributes are sets;
/// order carries no meaning.
pub(crate) fn seq_set_equal(a: &[String], b: &[String]) -> bool {
    let left: HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    left == right
}

/// Compare two stored values under a kind's equality rules.
pub(crate) fn equivalent(kind: AttrKind, a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Seq(x)), Some(Value::Seq(y))) if kind == AttrKind::Sequence => {
            seq_set_equal(x, y)
        }
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// A value supplied to a setter, before kind-specific coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueInput {
    Absent,
    Text(String),
    Seq(Vec<String>),
    Bytes(Vec<u8>),
    Bool(bool),
    Int(i64),
}

impl From<&str> for ValueInput {
    fn from(s: &str) -> Self {
        ValueInput::Text(s.to_string())
    }
}

impl From<String> for ValueInput {
    fn from(s: String) -> Self {
        ValueInput::Text(s)
    }
}

impl From<Vec<String>> for ValueInput {
    fn from(items: Vec<String>) -> Self {
        ValueInput::Seq(items)
    }
}

impl From<Vec<&str>> for ValueInput {
    fn from(items: Vec<&str>) -> Self {
        ValueInput::Seq(items.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for ValueInput {
    fn from(items: &[&str]) -> Self {
        ValueInput::Seq(items.iter().map(|s| (*s).to_string()).collect())
    }
}

impl From<Vec<u8>> for ValueInput {
    fn from(bytes: Vec<u8>) -> Self {
        ValueInput::Bytes(bytes)
    }
}

impl From<&[u8]> for ValueInput {
    fn from(bytes: &[u8]) -> Self {
        ValueInput::Bytes(bytes.to_vec())
    }
}

impl From<bool> for ValueInput {
    fn from(flag: bool) -> Self {
        ValueInput::Bool(flag)
    }
}

impl From<i64> for ValueInput {
    fn from(n: i64) -> Self {
        ValueInput::Int(n)
    }
}

impl From<i32> for ValueInput {
    fn from(n: i32) -> Self {
        ValueInput::Int(i64::from(n))
    }
}

impl From<u32> for ValueInput {
    fn from(n: u32) -> Self {
        ValueInput::Int(i64::from(n))
    }
}

impl From<Value> for ValueInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Text(s) => ValueInput::Text(s),
            Value::Seq(items) => ValueInput::Seq(items),
            Value::Bytes(b) => ValueInput::Bytes(b),
            Value::Bool(flag) => ValueInput::Bool(flag),
        }
    }
}

impl<T: Into<ValueInput>> From<Option<T>> for ValueInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(ValueInput::Absent, Into::into)
    }
}

/// Coerce a raw input into the stored shape for a kind.
///
/// `None` means absent; sequence kinds are never absent, they normalize to
/// the empty list instead.
pub(crate) fn coerce(attr: &str, kind: AttrKind, input: ValueInput) -> ModelResult<Option<Value>> {
    match kind {
        AttrKind::Text => coerce_text(attr, input),
        AttrKind::Sequence => coerce_sequence(attr, input),
        AttrKind::Binary => coerce_binary(attr, input),
        AttrKind::Boolean => coerce_boolean(attr, input),
        AttrKind::Computed => Err(ModelError::schema(format!(
            "computed attribute '{attr}' cannot be assigned"
        ))),
    }
}

fn coerce_text(attr: &str, input: ValueInput) -> ModelResult<Option<Value>> {
    match input {
        ValueInput::Absent => Ok(None),
        ValueInput::Text(s) if is_blank(&s) => Ok(None),
        ValueInput::Text(s) => Ok(Some(Value::Text(s))),
        ValueInput::Seq(items) => {
            let mut kept: Vec<String> = items.into_iter().filter(|s| !is_blank(s)).collect();
            match kept.len() {
                0 => Ok(None),
                1 => Ok(kept.pop().map(Value::Text)),
                _ => Ok(Some(Value::Seq(kept))),
            }
        }
        ValueInput::Bytes(b) => match String::from_utf8(b) {
            Ok(s) if is_blank(&s) => Ok(None),
            Ok(s) => Ok(Some(Value::Text(s))),
            Err(_) => Err(ModelError::schema(format!(
                "text attribute '{attr}' given a non-UTF-8 byte payload"
            ))),
        },
        ValueInput::Bool(flag) => Ok(Some(Value::Text(
            Value::canonical_bool_text(flag).to_string(),
        ))),
        ValueInput::Int(n) => Ok(Some(Value::Text(n.to_string()))),
    }
}

fn coerce_sequence(attr: &str, input: ValueInput) -> ModelResult<Option<Value>> {
    match input {
        ValueInput::Absent => Ok(Some(Value::Seq(Vec::new()))),
        ValueInput::Text(s) if is_blank(&s) => Ok(Some(Value::Seq(Vec::new()))),
        ValueInput::Text(s) => Ok(Some(Value::Seq(vec![s]))),
        ValueInput::Seq(items) => Ok(Some(Value::Seq(
            items.into_iter().filter(|s| !is_blank(s)).collect(),
        ))),
        ValueInput::Int(n) => Ok(Some(Value::Seq(vec![n.to_string()]))),
        ValueInput::Bytes(_) | ValueInput::Bool(_) => Err(ModelError::schema(format!(
            "sequence attribute '{attr}' accepts text values only"
        ))),
    }
}

fn coerce_binary(attr: &str, input: ValueInput) -> ModelResult<Option<Value>> {
    match input {
        ValueInput::Absent => Ok(None),
        ValueInput::Bytes(b) if b.is_empty() => Ok(None),
        ValueInput::Bytes(b) => Ok(Some(Value::Bytes(b))),
        ValueInput::Text(s) if is_blank(&s) => Ok(None),
        ValueInput::Text(s) => Ok(Some(Value::Bytes(s.into_bytes()))),
        ValueInput::Seq(_) | ValueInput::Bool(_) | ValueInput::Int(_) => Err(ModelError::schema(
            format!("binary attribute '{attr}' accepts raw bytes only"),
        )),
    }
}

fn coerce_boolean(attr: &str, input: ValueInput) -> ModelResult<Option<Value>> {
    match input {
        ValueInput::Absent => Ok(None),
        ValueInput::Bool(flag) => Ok(Some(Value::Bool(flag))),
        ValueInput::Text(s) if is_blank(&s) => Ok(None),
        ValueInput::Text(s) if s == BOOLEAN_TRUE => Ok(Some(Value::Bool(true))),
        ValueInput::Text(s) if s == BOOLEAN_FALSE => Ok(Some(Value::Bool(false))),
        ValueInput::Text(s) => Err(ModelError::schema(format!(
            "boolean attribute '{attr}' expects {BOOLEAN_TRUE} or {BOOLEAN_FALSE}, got '{s}'"
        ))),
        ValueInput::Seq(_) | ValueInput::Bytes(_) | ValueInput::Int(_) => Err(ModelError::schema(
            format!("boolean attribute '{attr}' accepts logical values only"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_coercion_blank_normalizes_to_absent() {
        assert_eq!(coerce("sn", AttrKind::Text, "".into()).unwrap(), None);
        assert_eq!(coerce("sn", AttrKind::Text, "   ".into()).unwrap(), None);
        assert_eq!(
            coerce("sn", AttrKind::Text, "Smith".into()).unwrap(),
            Some(Value::Text("Smith".to_string()))
        );
    }

    #[test]
    fn test_text_coercion_collapses_single_element_lists() {
        let got = coerce("mail", AttrKind::Text, vec!["a@example.com", " "].into()).map(|v| v.unwrap());
        assert_eq!(got.unwrap(), Value::Text("a@example.com".to_string()));

        let got = coerce("mail", AttrKind::Text, vec!["a@example.com", "b@example.com"].into()).unwrap();
        assert_eq!(
            got,
            Some(Value::Seq(vec![
                "a@example.com".to_string(),
                "b@example.com".to_string()
            ]))
        );
    }

    #[test]
    fn test_text_coercion_stringifies_numbers_and_booleans() {
        assert_eq!(
            coerce("uidNumber", AttrKind::Text, 1042.into()).unwrap(),
            Some(Value::Text("1042".to_string()))
        );
        assert_eq!(
            coerce("flag", AttrKind::Text, true.into()).unwrap(),
            Some(Value::Text("TRUE".to_string()))
        );
    }

    #[test]
    fn test_sequence_coercion_always_yields_a_list() {
        assert_eq!(
            coerce("memberOf", AttrKind::Sequence, ValueInput::Absent).unwrap(),
            Some(Value::Seq(vec![]))
        );
        assert_eq!(
            coerce("memberOf", AttrKind::Sequence, "cn=g1".into()).unwrap(),
            Some(Value::Seq(vec!["cn=g1".to_string()]))
        );
        assert_eq!(
            coerce("memberOf", AttrKind::Sequence, vec!["a", "", "b"].into()).unwrap(),
            Some(Value::Seq(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_sequence_rejects_bytes() {
        assert!(coerce("memberOf", AttrKind::Sequence, vec![0u8, 1].into()).is_err());
    }

    #[test]
    fn test_binary_coercion() {
        assert_eq!(
            coerce("objectGUID", AttrKind::Binary, vec![0u8, 159, 146].into()).unwrap(),
            Some(Value::Bytes(vec![0, 159, 146]))
        );
        assert_eq!(
            coerce("objectGUID", AttrKind::Binary, Vec::<u8>::new().into()).unwrap(),
            None
        );
        // Strings are taken as their raw bytes.
        assert_eq!(
            coerce("objectGUID", AttrKind::Binary, "abc".into()).unwrap(),
            Some(Value::Bytes(b"abc".to_vec()))
        );
    }

    #[test]
    fn test_boolean_coercion_accepts_canonical_text() {
        assert_eq!(
            coerce("hidden", AttrKind::Boolean, true.into()).unwrap(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            coerce("hidden", AttrKind::Boolean, "TRUE".into()).unwrap(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            coerce("hidden", AttrKind::Boolean, "FALSE".into()).unwrap(),
            Some(Value::Bool(false))
        );
        assert!(coerce("hidden", AttrKind::Boolean, "yes".into()).is_err());
    }

    #[test]
    fn test_computed_rejects_assignment() {
        assert!(coerce("derived", AttrKind::Computed, "x".into()).is_err());
    }

    #[test]
    fn test_seq_set_equality_ignores_order() {
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["y".to_string(), "x".to_string()];
        assert!(seq_set_equal(&a, &b));
        assert!(!seq_set_equal(&a, &["x".to_string()]));
    }

    #[test]
    fn test_equivalent_uses_set_compare_for_sequences_only() {
        let a = Value::Seq(vec!["x".to_string(), "y".to_string()]);
        let b = Value::Seq(vec!["y".to_string(), "x".to_string()]);
        assert!(equivalent(AttrKind::Sequence, Some(&a), Some(&b)));
        // Under text kind the same shapes compare structurally.
        assert!(!equivalent(AttrKind::Text, Some(&a), Some(&b)));
        assert!(equivalent(AttrKind::Text, None, None));
        assert!(!equivalent(AttrKind::Text, Some(&a), None));
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(
            Value::Text("x".to_string()).wire_values(),
            vec![b"x".to_vec()]
        );
        assert_eq!(
            Value::Seq(vec!["a".to_string(), "b".to_string()]).wire_values(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
        assert_eq!(Value::Bool(true).wire_values(), vec![b"TRUE".to_vec()]);
        assert_eq!(
            Value::Bytes(vec![1, 2, 3]).wire_values(),
            vec![vec![1, 2, 3]]
        );
    }

    #[test]
    fn test_binary_marker_is_stable_and_irreversible() {
        let marker = binary_marker(b"secret-blob");
        assert!(marker.starts_with("[binary sha256:"));
        assert!(marker.ends_with(']'));
        assert_eq!(marker, binary_marker(b"secret-blob"));
        assert_ne!(marker, binary_marker(b"other-blob"));
        assert!(!marker.contains("secret"));
    }

    #[test]
    fn test_loggable_json_redacts_bytes() {
        let v = Value::Bytes(vec![1, 2, 3]);
        let logged = v.to_loggable_json();
        let text = logged.as_str().unwrap();
        assert!(text.starts_with("[binary sha256:"));

        let v = Value::Seq(vec!["a".to_string()]);
        assert_eq!(v.to_loggable_json(), serde_json::json!(["a"]));
    }

    #[test]
    fn test_to_json_encodes_bytes_as_base64() {
        let v = Value::Bytes(b"ab".to_vec());
        assert_eq!(v.to_json(), serde_json::json!("YWI="));
    }

    #[test]
    fn test_canonicalize_bool() {
        assert_eq!(
            canonicalize_bool(Value::Bool(true)),
            Value::Text("TRUE".to_string())
        );
        assert_eq!(
            canonicalize_bool(Value::Text("x".to_string())),
            Value::Text("x".to_string())
        );
    }

    #[test]
    fn test_value_input_from_option() {
        let input: ValueInput = Option::<&str>::None.into();
        assert_eq!(input, ValueInput::Absent);
        let input: ValueInput = Some("x").into();
        assert_eq!(input, ValueInput::Text("x".to_string()));
    }
}
