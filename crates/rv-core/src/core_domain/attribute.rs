//! Loosely-typed trace attribute model.
//!
//! Trace exports encode attributes two ways: the OTLP JSON array of
//! `{key, value: AnyValue}` pairs, or a flattened `{key: plain_json}` object.
//! Both decode into [`Attributes`], so adapters never depend on one wire
//! encoding.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

// ---------------------------------------------------------------------------
// AttributeValue
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Array(Vec<AttributeValue>),
    KvList(Vec<(String, AttributeValue)>),
}

impl AttributeValue {
    /// Decodes an OTLP `AnyValue` object (`{"stringValue": "..."}`,
    /// `{"arrayValue": {"values": [...]}}`, ...). Anything that is not
    /// AnyValue-shaped is decoded as plain JSON.
    pub fn from_any_value(value: &Value) -> Option<Self> {
        let Some(obj) = value.as_object() else {
            return Self::from_plain(value);
        };

        if let Some(s) = obj.get("stringValue") {
            return Some(match s {
                Value::String(s) => Self::String(s.clone()),
                other => Self::String(other.to_string()),
            });
        }
        if let Some(i) = obj.get("intValue") {
            return match i {
                Value::Number(n) => n
                    .as_i64()
                    .map(Self::Int)
                    .or_else(|| n.as_f64().map(Self::Double)),
                Value::String(s) => Some(
                    s.parse::<i64>()
                        .map(Self::Int)
                        .unwrap_or_else(|_| Self::String(s.clone())),
                ),
                _ => None,
            };
        }
        if let Some(d) = obj.get("doubleValue") {
            return match d {
                Value::Number(n) => n.as_f64().map(Self::Double),
                Value::String(s) => s.parse::<f64>().ok().map(Self::Double),
                _ => None,
            };
        }
        if let Some(b) = obj.get("boolValue") {
            return b.as_bool().map(Self::Bool);
        }
        if let Some(arr) = obj.get("arrayValue") {
            let values = arr
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(Self::from_any_value).collect())
                .unwrap_or_default();
            return Some(Self::Array(values));
        }
        if let Some(kvlist) = obj.get("kvlistValue") {
            let entries = kvlist
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(decode_key_value).collect())
                .unwrap_or_default();
            return Some(Self::KvList(entries));
        }
        if let Some(bytes) = obj.get("bytesValue") {
            return bytes.as_str().map(|s| Self::String(s.to_owned()));
        }
        if obj.is_empty() {
            return None;
        }

        Self::from_plain(value)
    }

    /// Decodes an ordinary JSON value. `null` has no attribute representation.
    pub fn from_plain(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Double)),
            Value::Array(items) => Some(Self::Array(
                items.iter().filter_map(Self::from_plain).collect(),
            )),
            Value::Object(map) => Some(Self::KvList(
                map.iter()
                    .filter_map(|(k, v)| Self::from_plain(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
            Self::Bool(b) => Value::Bool(*b),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::KvList(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable text. Scalars print as-is; structures print as compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Array(_) | Self::KvList(_) => self.to_json().to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) => u64::try_from(*i).ok(),
            Self::Double(d) if d.is_finite() && *d >= 0.0 => Some(d.round() as u64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Looks up a key inside a keyed-list value.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        match self {
            Self::KvList(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

fn decode_key_value(entry: &Value) -> Option<(String, AttributeValue)> {
    let key = entry.get("key")?.as_str()?;
    let value = AttributeValue::from_any_value(entry.get("value")?)?;
    Some((key.to_owned(), value))
}

// ---------------------------------------------------------------------------
// Attributes: ordered key/value map
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes either attribute encoding. Unknown shapes decode as empty.
    pub fn from_json(value: &Value) -> Self {
        let entries = match value {
            Value::Array(items) => items.iter().filter_map(decode_key_value).collect(),
            Value::Object(map) => map
                .iter()
                .filter_map(|(k, v)| AttributeValue::from_plain(v).map(|v| (k.clone(), v)))
                .collect(),
            _ => Vec::new(),
        };
        Self { entries }
    }

    pub fn push(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.entries.push((key.into(), value));
    }

    pub fn extend(&mut self, other: Attributes) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// First key from `keys` (in list order) that is present.
    pub fn first_of<'a, S: AsRef<str>>(
        &'a self,
        keys: &'a [S],
    ) -> Option<(&'a str, &'a AttributeValue)> {
        keys.iter()
            .find_map(|k| self.get(k.as_ref()).map(|v| (k.as_ref(), v)))
    }

    /// Like [`Attributes::first_of`], but a key that is absent is also tried
    /// in its indexed flattened form (`key.0.role`, `key.0.content`, ...).
    pub fn resolve<S: AsRef<str>>(&self, keys: &[S]) -> Option<AttributeValue> {
        keys.iter().find_map(|k| {
            let key = k.as_ref();
            self.get(key).cloned().or_else(|| self.indexed(key))
        })
    }

    pub fn contains_any<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        self.resolve(keys).is_some()
    }

    /// Unflattens `prefix.<n>.<path>` keys into an array ordered by `n`.
    pub fn indexed(&self, prefix: &str) -> Option<AttributeValue> {
        let mut slots: BTreeMap<usize, Value> = BTreeMap::new();

        for (key, value) in &self.entries {
            let Some(rest) = key
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('.'))
            else {
                continue;
            };
            let (index, path) = rest.split_once('.').unwrap_or((rest, ""));
            let Ok(index) = index.parse::<usize>() else {
                continue;
            };

            if path.is_empty() {
                slots.insert(index, value.to_json());
                continue;
            }

            let slot = slots
                .entry(index)
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                let segments: Vec<&str> = path.split('.').collect();
                insert_path(map, &segments, value.to_json());
            }
        }

        if slots.is_empty() {
            return None;
        }
        AttributeValue::from_plain(&Value::Array(slots.into_values().collect()))
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

fn insert_path(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_owned(), value);
        }
        [head, tail @ ..] => {
            let child = map
                .entry((*head).to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child_map) = child {
                insert_path(child_map, tail, value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
