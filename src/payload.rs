//! Value vocabulary shared by the parser, formatter, validator, and stores:
//! raw submitted values, record identifiers, and store-ready field values.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Whether a write request targets a new record or an existing one.
/// Relation and file handling differ between the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Update,
}

/// One raw value decoded from a request body. Untyped until formatted.
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    Text(String),
    TextList(Vec<String>),
    Blob(UploadedBlob),
}

impl RawValue {
    /// The value as submitted text, if it is textual. A list yields its
    /// last entry (later form inputs override earlier ones).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            RawValue::TextList(items) => items.last().map(String::as_str),
            RawValue::Blob(_) => None,
        }
    }

    /// All textual entries, for multi-value fields.
    pub fn text_items(&self) -> Vec<&str> {
        match self {
            RawValue::Text(s) => vec![s.as_str()],
            RawValue::TextList(items) => items.iter().map(String::as_str).collect(),
            RawValue::Blob(_) => Vec::new(),
        }
    }
}

/// A file part decoded from a multipart body.
#[derive(Clone, PartialEq)]
pub struct UploadedBlob {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedBlob {
    /// Browsers submit an untouched file input as a nameless empty part.
    pub fn is_empty(&self) -> bool {
        self.filename.is_empty() && self.bytes.is_empty()
    }
}

impl fmt::Debug for UploadedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedBlob")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Raw key -> value(s) mapping decoded from a request body. Keys correspond
/// loosely to field names; repeated keys accumulate into a list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmittedForm {
    entries: BTreeMap<String, RawValue>,
}

impl SubmittedForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let next = match self.entries.remove(&key) {
            Some(RawValue::Text(prev)) => RawValue::TextList(vec![prev, value]),
            Some(RawValue::TextList(mut items)) => {
                items.push(value);
                RawValue::TextList(items)
            }
            Some(RawValue::Blob(_)) | None => RawValue::Text(value),
        };
        self.entries.insert(key, next);
    }

    pub fn push_blob(&mut self, key: impl Into<String>, blob: UploadedBlob) {
        self.entries.insert(key.into(), RawValue::Blob(blob));
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<RawValue> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawValue)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A record identifier coerced to the resource's identifier type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordId {
    Int(i64),
    Uuid(Uuid),
    Text(String),
}

impl RecordId {
    pub fn to_json(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::Number((*n).into()),
            RecordId::Uuid(u) => Value::String(u.to_string()),
            RecordId::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Uuid(u) => write!(f, "{}", u),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// Directive produced for a relation field: which foreign identifiers to
/// link. `Replace` also unlinks every identifier not listed; it is only
/// legal on update (a new record has no existing links to replace).
#[derive(Clone, Debug, PartialEq)]
pub enum RelationDirective {
    Link(Vec<RecordId>),
    Replace(Vec<RecordId>),
}

impl RelationDirective {
    pub fn ids(&self) -> &[RecordId] {
        match self {
            RelationDirective::Link(ids) | RelationDirective::Replace(ids) => ids,
        }
    }
}

/// A store-ready value produced by the field formatter. `Null` is an
/// explicit unset directive, distinct from the field being absent.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    Json(Value),
    Relation(RelationDirective),
    FileRef(String),
}

impl FieldValue {
    /// Whether this value counts as missing for the required-field rule.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Relation(d) => d.ids().is_empty(),
            FieldValue::FileRef(h) => h.is_empty(),
            _ => false,
        }
    }

    /// JSON rendering used for props echo and by the in-memory store.
    /// Relation directives render as their identifier list.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(n) => Value::Number((*n).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::DateTime(d) => Value::String(d.to_rfc3339()),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
            FieldValue::Json(v) => v.clone(),
            FieldValue::Relation(d) => {
                Value::Array(d.ids().iter().map(RecordId::to_json).collect())
            }
            FieldValue::FileRef(h) => Value::String(h.clone()),
        }
    }
}

/// The submitted form after per-field transformation into store-native
/// shapes. One entry per writable field that the request addressed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormattedPayload {
    values: BTreeMap<String, FieldValue>,
}

impl FormattedPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.values.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Full JSON echo of the payload, used to repopulate the form after a
    /// rejected submission.
    pub fn to_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_text_keys_accumulate() {
        let mut form = SubmittedForm::new();
        form.push_text("tags", "1");
        form.push_text("tags", "2");
        assert_eq!(
            form.get("tags"),
            Some(&RawValue::TextList(vec!["1".into(), "2".into()]))
        );
        assert_eq!(form.get("tags").unwrap().text_items(), vec!["1", "2"]);
    }

    #[test]
    fn as_text_takes_last_entry() {
        let v = RawValue::TextList(vec!["a".into(), "b".into()]);
        assert_eq!(v.as_text(), Some("b"));
    }

    #[test]
    fn empty_values_detected() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::Text(String::new()).is_empty());
        assert!(FieldValue::Relation(RelationDirective::Link(vec![])).is_empty());
        assert!(!FieldValue::Bool(false).is_empty());
        assert!(!FieldValue::Int(0).is_empty());
    }

    #[test]
    fn payload_echo_renders_relations_as_id_lists() {
        let mut payload = FormattedPayload::new();
        payload.set(
            "tags",
            FieldValue::Relation(RelationDirective::Link(vec![
                RecordId::Int(1),
                RecordId::Int(2),
            ])),
        );
        payload.set("title", FieldValue::Text("Hello".into()));
        assert_eq!(
            payload.to_json(),
            serde_json::json!({"tags": [1, 2], "title": "Hello"})
        );
    }
}
