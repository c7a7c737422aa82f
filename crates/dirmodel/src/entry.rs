//! Typed, change-tracked directory entries
//!
//! An [`Entry`] is the in-memory representation of one directory record:
//! an immutable dn, a map of typed attribute values shaped by the model
//! type's schema, a persisted flag, and a change log accumulated since
//! construction or the last successful persist/reload.
//!
//! The change log records, per attribute, the value before the first
//! change in the current unit of work and the current value. It is cleared
//! on successful create/save/reload and deliberately preserved on failure,
//! so callers can inspect what was attempted.

use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::client::{ModOp, Record};
use crate::error::{ModelError, ModelResult};
use crate::model::ModelType;
use crate::value::{
    canonicalize_bool, coerce, equivalent, is_blank, AttrKind, Value, ValueInput, BOOLEAN_TRUE,
};

/// Per-attribute (before, after) pairs accumulated since the last
/// persist/reload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLog {
    entries: HashMap<String, (Option<Value>, Option<Value>)>,
}

impl ChangeLog {
    /// Whether any attribute has a pending change.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of attributes with pending changes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The (before, after) pair for one attribute, if changed.
    pub fn get(&self, attribute: &str) -> Option<&(Option<Value>, Option<Value>)> {
        self.entries.get(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &(Option<Value>, Option<Value>))> {
        self.entries.iter()
    }

    /// Record a change. The first change of an attribute captures its
    /// "before"; later changes keep that original and move the "after".
    pub(crate) fn record(
        &mut self,
        attribute: String,
        before: Option<Value>,
        after: Option<Value>,
    ) {
        match self.entries.entry(attribute) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                occupied.get_mut().1 = after;
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert((before, after));
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One typed, change-tracked directory record.
#[derive(Debug, Clone)]
pub struct Entry {
    ty: Arc<ModelType>,
    dn: String,
    attrs: HashMap<String, Option<Value>>,
    persisted: bool,
    log: ChangeLog,
}

impl Entry {
    /// Create a transient entry for a dn, with the model type's new-entry
    /// defaults applied. The dn is fixed for the entry's lifetime.
    pub fn new(ty: Arc<ModelType>, dn: impl Into<String>) -> Entry {
        let mut attrs = HashMap::new();
        for (attribute, value) in ty.defaults() {
            attrs.insert(attribute.clone(), Some(value.clone()));
        }
        Entry {
            ty,
            dn: dn.into(),
            attrs,
            persisted: false,
            log: ChangeLog::default(),
        }
    }

    /// Map a raw directory record into a typed entry.
    ///
    /// Every backed attribute is decoded per its kind: blank values are
    /// dropped, binary values stay raw bytes, text decodes as UTF-8, a
    /// single remaining value collapses to a scalar unless the kind is
    /// sequence, and booleans compare against the canonical `TRUE` text.
    /// The change log starts empty.
    pub fn from_record(ty: Arc<ModelType>, record: &Record, persisted: bool) -> Entry {
        let attrs = decode_attrs(&ty, record);
        Entry {
            ty,
            dn: record.dn.clone(),
            attrs,
            persisted,
            log: ChangeLog::default(),
        }
    }

    /// Distinguished name of this entry.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// The model type this entry belongs to.
    pub fn model_type(&self) -> &Arc<ModelType> {
        &self.ty
    }

    /// Whether this entry is backed by a directory record.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// The pending change log.
    pub fn change_log(&self) -> &ChangeLog {
        &self.log
    }

    /// Whether any attribute changed since the last persist/reload.
    pub fn has_changes(&self) -> bool {
        !self.log.is_empty()
    }

    /// The value of the leading relative-name component of the dn, when
    /// its attribute matches the type's short-name attribute. Best-effort:
    /// `None` on foreign or malformed leading components.
    pub fn short_name(&self) -> Option<String> {
        let (attribute, value) = leading_rdn(&self.dn)?;
        if attribute.eq_ignore_ascii_case(self.ty.short_name_attribute()) && !is_blank(&value) {
            Some(value)
        } else {
            None
        }
    }

    /// Read an attribute by directory name or declared accessor.
    ///
    /// Unknown names fail closed with a schema error. Sequence-kind
    /// attributes always return a list, present or not. Computed
    /// attributes evaluate their registered derivation.
    pub fn get(&self, name: &str) -> ModelResult<Option<Value>> {
        let resolved = self.ty.schema().resolve(name)?;
        if resolved.kind == AttrKind::Computed {
            return Ok(self.ty.computed_value(&resolved.attribute, self));
        }
        Ok(self.current_value(&resolved.attribute, resolved.kind))
    }

    /// Read an attribute as text. Multi-valued attributes yield their
    /// first value, booleans their canonical text, binary values nothing.
    pub fn text(&self, name: &str) -> ModelResult<Option<String>> {
        Ok(self.get(name)?.and_then(|value| match value {
            Value::Text(s) => Some(s),
            Value::Seq(items) => items.into_iter().next(),
            Value::Bool(flag) => Some(Value::canonical_bool_text(flag).to_string()),
            Value::Bytes(_) => None,
        }))
    }

    /// Read an attribute as a list of strings; absent becomes the empty
    /// list, a scalar becomes a one-element list.
    pub fn seq(&self, name: &str) -> ModelResult<Vec<String>> {
        Ok(self.get(name)?.map_or_else(Vec::new, |value| match value {
            Value::Seq(items) => items,
            Value::Text(s) => vec![s],
            Value::Bool(flag) => vec![Value::canonical_bool_text(flag).to_string()],
            Value::Bytes(_) => Vec::new(),
        }))
    }

    /// Read an attribute as a logical flag; absent reads as false.
    pub fn boolean(&self, name: &str) -> ModelResult<bool> {
        Ok(match self.get(name)? {
            Some(Value::Bool(flag)) => flag,
            Some(Value::Text(s)) => s == BOOLEAN_TRUE,
            _ => false,
        })
    }

    /// Read an attribute as raw bytes.
    pub fn bytes(&self, name: &str) -> ModelResult<Option<Vec<u8>>> {
        Ok(self.get(name)?.and_then(|value| match value {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.into_bytes()),
            _ => None,
        }))
    }

    /// Assign an attribute by directory name or writable accessor.
    ///
    /// The input is coerced per the attribute's kind; blank values
    /// normalize to absent. Assigning a value equivalent to the current
    /// one (set-equivalent for sequences) records nothing. Otherwise the
    /// change log captures (before, after), keeping the original "before"
    /// across repeated assignments.
    pub fn set(&mut self, name: &str, value: impl Into<ValueInput>) -> ModelResult<()> {
        let resolved = self.ty.schema().resolve(name)?;
        if !resolved.writable {
            return Err(ModelError::schema(format!(
                "accessor '{name}' is read-only"
            )));
        }

        let new_value = coerce(&resolved.attribute, resolved.kind, value.into())?;
        let current = self.current_value(&resolved.attribute, resolved.kind);

        if equivalent(resolved.kind, current.as_ref(), new_value.as_ref()) {
            return Ok(());
        }

        self.log
            .record(resolved.attribute.clone(), current, new_value.clone());
        self.attrs.insert(resolved.attribute, new_value);
        Ok(())
    }

    /// Snapshot of the change log with boolean values canonicalized to
    /// their directory text form. Canonicalization happens here and only
    /// here, so repeated identical logical assignments never register.
    pub fn changes(&self) -> BTreeMap<String, (Option<Value>, Option<Value>)> {
        self.log
            .iter()
            .map(|(attribute, (before, after))| {
                (
                    attribute.clone(),
                    (
                        before.clone().map(canonicalize_bool),
                        after.clone().map(canonicalize_bool),
                    ),
                )
            })
            .collect()
    }

    /// The change snapshot rendered for audit logs: binary payloads are
    /// replaced by content-hash markers. Irreversible by design.
    pub fn loggable_changes(&self) -> serde_json::Value {
        let render = |value: &Option<Value>| {
            value
                .as_ref()
                .map_or(serde_json::Value::Null, Value::to_loggable_json)
        };
        let mut map = serde_json::Map::new();
        for (attribute, (before, after)) in self.changes() {
            map.insert(
                attribute,
                serde_json::Value::Array(vec![render(&before), render(&after)]),
            );
        }
        serde_json::Value::Object(map)
    }

    /// Serialize the export attribute set (backed plus computed) to JSON.
    /// Binary values become base64 text; absent values are explicit nulls.
    pub fn export(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("dn".to_string(), json!(self.dn));
        for name in self.ty.schema().export_attributes() {
            let value = match self.ty.schema().kind_of(name) {
                Some(AttrKind::Computed) => self.ty.computed_value(name, self),
                Some(kind) => self.current_value(name, kind),
                None => None,
            };
            map.insert(
                name.to_string(),
                value.map_or(serde_json::Value::Null, |v| v.to_json()),
            );
        }
        serde_json::Value::Object(map)
    }

    /// Minimal modify operations for the pending changes: add where the
    /// value was absent, delete where it became absent, replace otherwise.
    /// Empty sequences count as absent.
    pub(crate) fn pending_ops(&self) -> Vec<ModOp> {
        let mut ops = Vec::new();
        for (attribute, (before, after)) in self.changes() {
            let before_absent = before.as_ref().map_or(true, Value::is_effectively_absent);
            let after_absent = after.as_ref().map_or(true, Value::is_effectively_absent);
            let values = after.as_ref().map(Value::wire_values).unwrap_or_default();
            match (before_absent, after_absent) {
                (true, true) => {}
                (true, false) => ops.push(ModOp::add(attribute, values)),
                (false, true) => ops.push(ModOp::delete(attribute)),
                (false, false) => ops.push(ModOp::replace(attribute, values)),
            }
        }
        ops
    }

    /// Wire attributes for the initial add: every present value plus the
    /// short-name attribute derived from the dn when not set explicitly.
    pub(crate) fn attributes_for_add(&self) -> HashMap<String, Vec<Vec<u8>>> {
        let mut out = HashMap::new();
        for (attribute, value) in &self.attrs {
            if let Some(value) = value {
                if !value.is_effectively_absent() {
                    out.insert(attribute.clone(), value.wire_values());
                }
            }
        }

        let short_attr = self.ty.short_name_attribute();
        if !out.contains_key(short_attr) {
            if let Some(short_name) = self.short_name() {
                out.insert(short_attr.to_string(), vec![short_name.into_bytes()]);
            }
        }
        out
    }

    pub(crate) fn set_persisted(&mut self, persisted: bool) {
        self.persisted = persisted;
    }

    pub(crate) fn clear_changes(&mut self) {
        self.log.clear();
    }

    /// Replace all local attribute state from a fresh record, mark the
    /// entry persisted and clear the change log. Used by reload.
    pub(crate) fn assign_from_record(&mut self, record: &Record) {
        self.attrs = decode_attrs(&self.ty, record);
        self.dn = record.dn.clone();
        self.persisted = true;
        self.log.clear();
    }

    /// Current stored value with the sequence-kind list guarantee applied.
    fn current_value(&self, attribute: &str, kind: AttrKind) -> Option<Value> {
        let stored = self.attrs.get(attribute).cloned().flatten();
        normalize_for_kind(kind, stored)
    }
}

/// Decode every backed attribute of a record per the schema.
fn decode_attrs(ty: &ModelType, record: &Record) -> HashMap<String, Option<Value>> {
    let mut attrs = HashMap::new();
    for name in ty.schema().attributes() {
        let kind = match ty.schema().kind_of(name) {
            Some(kind) => kind,
            None => continue,
        };
        let raw = record.attrs.get(name).cloned().unwrap_or_default();
        attrs.insert(name.to_string(), decode_raw(kind, raw));
    }
    attrs
}

fn decode_raw(kind: AttrKind, raw: Vec<Vec<u8>>) -> Option<Value> {
    if kind == AttrKind::Binary {
        return raw
            .into_iter()
            .find(|bytes| !bytes.is_empty())
            .map(Value::Bytes);
    }

    let mut texts: Vec<String> = raw
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .filter(|s| !is_blank(s))
        .collect();

    match kind {
        AttrKind::Sequence => Some(Value::Seq(texts)),
        AttrKind::Boolean => texts.first().map(|s| Value::Bool(s == BOOLEAN_TRUE)),
        AttrKind::Text => match texts.len() {
            0 => None,
            1 => texts.pop().map(Value::Text),
            _ => Some(Value::Seq(texts)),
        },
        AttrKind::Binary | AttrKind::Computed => None,
    }
}

fn normalize_for_kind(kind: AttrKind, value: Option<Value>) -> Option<Value> {
    match (kind, value) {
        (AttrKind::Sequence, None) => Some(Value::Seq(Vec::new())),
        (AttrKind::Sequence, Some(Value::Text(s))) => Some(Value::Seq(vec![s])),
        (_, value) => value,
    }
}

/// Split the leading relative-name component of a dn into attribute and
/// value, honoring backslash escapes in the value.
fn leading_rdn(dn: &str) -> Option<(&str, String)> {
    let trimmed = dn.trim_start();
    let eq = trimmed.find('=')?;
    let attribute = trimmed[..eq].trim();
    if attribute.is_empty() || attribute.contains(',') {
        return None;
    }

    let mut value = String::new();
    let mut escaped = false;
    for ch in trimmed[eq + 1..].chars() {
        if escaped {
            value.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ',' {
            break;
        } else {
            value.push(ch);
        }
    }
    Some((attribute, value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ModKind;
    use crate::filter::Filter;
    use crate::model::ModelTypeBuilder;

    fn person_type() -> Arc<ModelType> {
        Arc::new(
            ModelTypeBuilder::new("person")
                .base("dc=example,dc=com")
                .filter(Filter::eq("objectClass", "person"))
                .text(["cn", "mail", "sn", "title"])
                .sequence(["memberOf"])
                .binary(["objectGUID"])
                .boolean(["hidden"])
                .writable_accessor("email", "mail")
                .accessor("groups", "memberOf")
                .computed("label", |entry| {
                    entry
                        .text("cn")
                        .ok()
                        .flatten()
                        .map(|cn| Value::Text(format!("person:{cn}")))
                })
                .build()
                .unwrap(),
        )
    }

    fn bob_record() -> Record {
        Record::new("cn=bob,dc=example,dc=com")
            .with_values("cn", ["bob"])
            .with_values("mail", ["bob@example.com"])
            .with_values("memberOf", ["cn=staff,dc=example,dc=com"])
            .with_values("hidden", ["FALSE"])
            .with_values("objectGUID", [vec![0x01u8, 0x02, 0xff]])
    }

    #[test]
    fn test_from_record_roundtrip_has_no_changes() {
        let entry = Entry::from_record(person_type(), &bob_record(), true);
        assert!(entry.is_persisted());
        assert!(entry.changes().is_empty());
        assert_eq!(
            entry.get("mail").unwrap(),
            Some(Value::Text("bob@example.com".to_string()))
        );
        assert_eq!(entry.get("hidden").unwrap(), Some(Value::Bool(false)));
        assert_eq!(
            entry.get("objectGUID").unwrap(),
            Some(Value::Bytes(vec![0x01, 0x02, 0xff]))
        );
    }

    #[test]
    fn test_single_mutation_records_one_change_with_original_before() {
        let mut entry = Entry::from_record(person_type(), &bob_record(), true);
        entry.set("mail", "robert@example.com").unwrap();

        let changes = entry.changes();
        assert_eq!(changes.len(), 1);
        let (before, after) = &changes["mail"];
        assert_eq!(*before, Some(Value::Text("bob@example.com".to_string())));
        assert_eq!(*after, Some(Value::Text("robert@example.com".to_string())));

        // A later assignment keeps the original "before".
        entry.set("mail", "rob@example.com").unwrap();
        let changes = entry.changes();
        let (before, after) = &changes["mail"];
        assert_eq!(*before, Some(Value::Text("bob@example.com".to_string())));
        assert_eq!(*after, Some(Value::Text("rob@example.com".to_string())));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_reassigning_current_value_is_not_a_change() {
        let mut entry = Entry::from_record(person_type(), &bob_record(), true);

        let mail = entry.get("mail").unwrap();
        entry.set("mail", mail).unwrap();
        assert!(entry.changes().is_empty());

        // Booleans compare logically, not textually.
        entry.set("hidden", false).unwrap();
        assert!(entry.changes().is_empty());

        // Sequences compare as unordered sets.
        let mut entry = Entry::from_record(
            person_type(),
            &bob_record().with_values("memberOf", ["cn=a", "cn=b"]),
            true,
        );
        entry.set("memberOf", vec!["cn=b", "cn=a"]).unwrap();
        assert!(entry.changes().is_empty());
    }

    #[test]
    fn test_sequence_kind_always_reads_as_list() {
        // Single raw value: still a list.
        let record = Record::new("cn=bob,dc=example,dc=com").with_values("memberOf", ["cn=staff"]);
        let entry = Entry::from_record(person_type(), &record, true);
        assert_eq!(
            entry.get("memberOf").unwrap(),
            Some(Value::Seq(vec!["cn=staff".to_string()]))
        );

        // Absent: the empty list, not absent.
        let record = Record::new("cn=bob,dc=example,dc=com");
        let entry = Entry::from_record(person_type(), &record, true);
        assert_eq!(entry.get("memberOf").unwrap(), Some(Value::Seq(vec![])));
    }

    #[test]
    fn test_multi_valued_text_stays_a_list() {
        let record = Record::new("cn=bob,dc=example,dc=com")
            .with_values("mail", ["a@example.com", "b@example.com"]);
        let entry = Entry::from_record(person_type(), &record, true);
        assert_eq!(
            entry.get("mail").unwrap(),
            Some(Value::Seq(vec![
                "a@example.com".to_string(),
                "b@example.com".to_string()
            ]))
        );
        assert_eq!(entry.text("mail").unwrap().as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_blank_values_normalize_to_absent() {
        let record = Record::new("cn=bob,dc=example,dc=com").with_values("sn", ["   "]);
        let entry = Entry::from_record(person_type(), &record, true);
        assert_eq!(entry.get("sn").unwrap(), None);

        let mut entry = entry;
        entry.set("title", "").unwrap();
        assert_eq!(entry.get("title").unwrap(), None);
        assert!(entry.changes().is_empty());
    }

    #[test]
    fn test_undeclared_attribute_fails_closed() {
        let entry = Entry::from_record(person_type(), &bob_record(), true);
        assert!(entry.get("shoeSize").is_err());

        let mut entry = entry;
        assert!(entry.set("shoeSize", "44").is_err());
    }

    #[test]
    fn test_accessors_resolve_and_respect_writability() {
        let mut entry = Entry::from_record(person_type(), &bob_record(), true);

        assert_eq!(
            entry.get("email").unwrap(),
            Some(Value::Text("bob@example.com".to_string()))
        );
        entry.set("email", "new@example.com").unwrap();
        assert!(entry.changes().contains_key("mail"));

        // "groups" is declared read-only.
        assert_eq!(
            entry.get("groups").unwrap(),
            Some(Value::Seq(vec!["cn=staff,dc=example,dc=com".to_string()]))
        );
        let err = entry.set("groups", vec!["cn=other"]).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_computed_attributes_read_and_export_but_never_write() {
        let entry = Entry::from_record(person_type(), &bob_record(), true);
        assert_eq!(
            entry.get("label").unwrap(),
            Some(Value::Text("person:bob".to_string()))
        );

        let mut entry = entry;
        assert!(entry.set("label", "x").is_err());

        let exported = entry.export();
        assert_eq!(exported["label"], "person:bob");
    }

    #[test]
    fn test_boolean_canonicalized_in_changes_only() {
        let mut entry = Entry::from_record(person_type(), &bob_record(), true);
        entry.set("hidden", true).unwrap();

        // Stored value stays logical.
        assert_eq!(entry.get("hidden").unwrap(), Some(Value::Bool(true)));

        // The change snapshot carries canonical text on both sides.
        let changes = entry.changes();
        let (before, after) = &changes["hidden"];
        assert_eq!(*before, Some(Value::Text("FALSE".to_string())));
        assert_eq!(*after, Some(Value::Text("TRUE".to_string())));
    }

    #[test]
    fn test_diff_to_operation_mapping() {
        let mut entry = Entry::from_record(person_type(), &bob_record(), true);
        entry.set("title", "engineer").unwrap(); // absent -> value: add
        entry.set("mail", Option::<&str>::None).unwrap(); // value -> absent: delete
        entry.set("cn", "robert").unwrap(); // value -> value: replace

        let ops = entry.pending_ops();
        assert_eq!(ops.len(), 3);

        let by_attr: HashMap<&str, &ModOp> =
            ops.iter().map(|op| (op.attribute.as_str(), op)).collect();
        assert_eq!(by_attr["title"].kind, ModKind::Add);
        assert_eq!(by_attr["title"].values, vec![b"engineer".to_vec()]);
        assert_eq!(by_attr["mail"].kind, ModKind::Delete);
        assert!(by_attr["mail"].values.is_empty());
        assert_eq!(by_attr["cn"].kind, ModKind::Replace);
        assert_eq!(by_attr["cn"].values, vec![b"robert".to_vec()]);
    }

    #[test]
    fn test_emptied_sequence_maps_to_delete() {
        let mut entry = Entry::from_record(person_type(), &bob_record(), true);
        entry.set("memberOf", Vec::<String>::new()).unwrap();

        let ops = entry.pending_ops();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, ModKind::Delete);
        assert_eq!(ops[0].attribute, "memberOf");
    }

    #[test]
    fn test_short_name_from_dn() {
        let entry = Entry::new(person_type(), "cn=bob,dc=example,dc=com");
        assert_eq!(entry.short_name().as_deref(), Some("bob"));

        // Case-insensitive attribute match.
        let entry = Entry::new(person_type(), "CN=Bob Smith,ou=p,dc=example,dc=com");
        assert_eq!(entry.short_name().as_deref(), Some("Bob Smith"));

        // Escaped comma stays part of the value.
        let entry = Entry::new(person_type(), "cn=Smith\\, Bob,dc=example,dc=com");
        assert_eq!(entry.short_name().as_deref(), Some("Smith, Bob"));

        // Foreign leading component: best effort yields nothing.
        let entry = Entry::new(person_type(), "uid=bob,dc=example,dc=com");
        assert_eq!(entry.short_name(), None);
    }

    #[test]
    fn test_attributes_for_add_includes_short_name() {
        let mut entry = Entry::new(person_type(), "cn=carol,dc=example,dc=com");
        entry.set("mail", "carol@example.com").unwrap();

        let attrs = entry.attributes_for_add();
        assert_eq!(attrs["cn"], vec![b"carol".to_vec()]);
        assert_eq!(attrs["mail"], vec![b"carol@example.com".to_vec()]);
        // The untouched empty sequence is not sent.
        assert!(!attrs.contains_key("memberOf"));
    }

    #[test]
    fn test_loggable_changes_redact_binary() {
        let mut entry = Entry::from_record(person_type(), &bob_record(), true);
        entry.set("objectGUID", vec![0xdeu8, 0xad]).unwrap();

        let logged = entry.loggable_changes();
        let after = logged["objectGUID"][1].as_str().unwrap();
        assert!(after.starts_with("[binary sha256:"));
        let before = logged["objectGUID"][0].as_str().unwrap();
        assert!(before.starts_with("[binary sha256:"));
    }

    #[test]
    fn test_export_shape() {
        let entry = Entry::from_record(person_type(), &bob_record(), true);
        let exported = entry.export();

        assert_eq!(exported["dn"], "cn=bob,dc=example,dc=com");
        assert_eq!(exported["mail"], "bob@example.com");
        assert_eq!(exported["hidden"], false);
        assert_eq!(exported["memberOf"], json!(["cn=staff,dc=example,dc=com"]));
        // Binary exports as base64, absent as null.
        assert_eq!(exported["objectGUID"], "AQL/");
        assert_eq!(exported["sn"], serde_json::Value::Null);
    }

    #[test]
    fn test_reload_assignment_replaces_state() {
        let mut entry = Entry::from_record(person_type(), &bob_record(), true);
        entry.set("mail", "stale@example.com").unwrap();
        assert!(entry.has_changes());

        let fresh = Record::new("cn=bob,dc=example,dc=com").with_values("mail", ["fresh@example.com"]);
        entry.assign_from_record(&fresh);

        assert!(!entry.has_changes());
        assert!(entry.is_persisted());
        assert_eq!(
            entry.text("mail").unwrap().as_deref(),
            Some("fresh@example.com")
        );
    }
}
