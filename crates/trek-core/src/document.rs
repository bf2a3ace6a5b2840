//! The generic document tree that migration commands and results are made of.
//!
//! Commands arrive from YAML/JSON and therefore only contain plain scalars,
//! arrays and maps. [`Value::DateTime`] never comes out of deserialisation;
//! it is produced by the [interpolation engine](crate::interpolate) when a
//! `{"$date": ...}` marker is resolved. Serialising a timestamp writes the
//! marker back out, so persisted documents stay valid extended JSON.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{
  Deserialize, Deserializer, Serialize, Serializer,
  de::{MapAccess, SeqAccess, Visitor},
  ser::SerializeMap,
};

/// An ordered map of keys to values. Key order is preserved because some
/// stores treat the first key of a command as the command name.
pub type Document = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  String(String),
  DateTime(DateTime<Utc>),
  Array(Vec<Value>),
  Document(Document),
}

impl Value {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
    match self {
      Self::DateTime(dt) => Some(dt),
      _ => None,
    }
  }

  pub fn as_array(&self) -> Option<&Vec<Value>> {
    match self {
      Self::Array(a) => Some(a),
      _ => None,
    }
  }

  pub fn as_document(&self) -> Option<&Document> {
    match self {
      Self::Document(d) => Some(d),
      _ => None,
    }
  }

  /// Look up `key` when this value is a document.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.as_document().and_then(|d| d.get(key))
  }

  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }
}

// ─── From impls ──────────────────────────────────────────────────────────────

impl From<bool> for Value {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Self::Int(i) }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self { Self::Float(f) }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::String(s.to_owned()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::String(s) }
}

impl From<DateTime<Utc>> for Value {
  fn from(dt: DateTime<Utc>) -> Self { Self::DateTime(dt) }
}

impl From<Vec<Value>> for Value {
  fn from(a: Vec<Value>) -> Self { Self::Array(a) }
}

impl From<Document> for Value {
  fn from(d: Document) -> Self { Self::Document(d) }
}

impl From<serde_json::Value> for Value {
  fn from(json: serde_json::Value) -> Self {
    use serde_json::Value as Json;
    match json {
      Json::Null => Self::Null,
      Json::Bool(b) => Self::Bool(b),
      Json::Number(n) => match n.as_i64() {
        Some(i) => Self::Int(i),
        None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
      },
      Json::String(s) => Self::String(s),
      Json::Array(a) => Self::Array(a.into_iter().map(Self::from).collect()),
      Json::Object(o) => Self::Document(
        o.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
      ),
    }
  }
}

/// Convert a JSON object into a [`Document`]; any other JSON value yields
/// `None`.
pub fn document_from_json(json: serde_json::Value) -> Option<Document> {
  match Value::from(json) {
    Value::Document(d) => Some(d),
    _ => None,
  }
}

// ─── Serialize ───────────────────────────────────────────────────────────────

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Null => serializer.serialize_unit(),
      Self::Bool(b) => serializer.serialize_bool(*b),
      Self::Int(i) => serializer.serialize_i64(*i),
      Self::Float(f) => serializer.serialize_f64(*f),
      Self::String(s) => serializer.serialize_str(s),
      Self::DateTime(dt) => {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("$date", &dt.to_rfc3339_opts(SecondsFormat::Millis, true))?;
        map.end()
      }
      Self::Array(a) => a.serialize(serializer),
      Self::Document(d) => d.serialize(serializer),
    }
  }
}

// ─── Deserialize ─────────────────────────────────────────────────────────────

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
  type Value = Value;

  fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("a document value")
  }

  fn visit_bool<E>(self, b: bool) -> Result<Value, E> { Ok(Value::Bool(b)) }

  fn visit_i64<E>(self, i: i64) -> Result<Value, E> { Ok(Value::Int(i)) }

  fn visit_u64<E>(self, u: u64) -> Result<Value, E> {
    Ok(match i64::try_from(u) {
      Ok(i) => Value::Int(i),
      Err(_) => Value::Float(u as f64),
    })
  }

  fn visit_f64<E>(self, f: f64) -> Result<Value, E> { Ok(Value::Float(f)) }

  fn visit_str<E>(self, s: &str) -> Result<Value, E> { Ok(Value::String(s.to_owned())) }

  fn visit_string<E>(self, s: String) -> Result<Value, E> { Ok(Value::String(s)) }

  fn visit_unit<E>(self) -> Result<Value, E> { Ok(Value::Null) }

  fn visit_none<E>(self) -> Result<Value, E> { Ok(Value::Null) }

  fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
    Value::deserialize(d)
  }

  fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
    let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
    while let Some(v) = seq.next_element()? {
      out.push(v);
    }
    Ok(Value::Array(out))
  }

  fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
    let mut out = Document::with_capacity(map.size_hint().unwrap_or(0));
    while let Some((k, v)) = map.next_entry::<String, Value>()? {
      out.insert(k, v);
    }
    Ok(Value::Document(out))
  }
}

impl<'de> Deserialize<'de> for Value {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    deserializer.deserialize_any(ValueVisitor)
  }
}
