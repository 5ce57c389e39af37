//! Tagged attribute values attached to knowledge items.
//!
//! Attributes are open-ended configuration dictionaries. They are modelled as a
//! closed set of variants instead of an untyped map so that equality and the
//! canonical byte encoding (which feeds the content hash) are well defined.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, KnowledgeResult};

/// Attribute map. Keys are kept sorted so the encoding is deterministic.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    String(String),
    Number(f64),
    Bool(bool),
    Map(BTreeMap<String, AttrValue>),
    Array(Vec<AttrValue>),
}

// Canonical encoding tags. Changing any of these changes every stored hash.
const TAG_STRING: u8 = 1;
const TAG_NUMBER: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_MAP: u8 = 4;
const TAG_ARRAY: u8 = 5;

impl AttrValue {
    /// Append the canonical encoding of this value to `out`.
    ///
    /// Lengths are written as little-endian `u64` prefixes so nested values
    /// cannot be confused with their neighbours. `-0.0` is folded into `0.0`
    /// and every NaN into one bit pattern, matching `PartialEq` as closely as
    /// floats allow.
    pub fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Self::String(s) => {
                out.push(TAG_STRING);
                write_bytes(out, s.as_bytes());
            }
            Self::Number(n) => {
                out.push(TAG_NUMBER);
                let n = if *n == 0.0 {
                    0.0
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                out.extend_from_slice(&n.to_bits().to_le_bytes());
            }
            Self::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*b));
            }
            Self::Map(map) => {
                out.push(TAG_MAP);
                write_map(out, map);
            }
            Self::Array(items) => {
                out.push(TAG_ARRAY);
                out.extend_from_slice(&(items.len() as u64).to_le_bytes());
                for item in items {
                    item.write_canonical(out);
                }
            }
        }
    }

    /// Render as plain JSON (no variant tags).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(AttrValue::to_json).collect())
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl TryFrom<serde_json::Value> for AttrValue {
    type Error = KnowledgeError;

    /// JSON `null` has no counterpart and is rejected.
    fn try_from(value: serde_json::Value) -> KnowledgeResult<Self> {
        use serde_json::Value;
        Ok(match value {
            Value::Null => {
                return Err(KnowledgeError::validation(
                    "null is not a valid attribute value; omit the key instead",
                ));
            }
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n.as_f64().ok_or_else(|| {
                KnowledgeError::validation(format!("number {n} does not fit in f64"))
            })?),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(AttrValue::try_from)
                    .collect::<KnowledgeResult<_>>()?,
            ),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| -> KnowledgeResult<(String, AttrValue)> {
                        Ok((k, AttrValue::try_from(v)?))
                    })
                    .collect::<KnowledgeResult<_>>()?,
            ),
        })
    }
}

/// Parse a JSON object into an attribute map.
pub fn attributes_from_json(json: &str) -> KnowledgeResult<Attributes> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| KnowledgeError::validation(format!("attributes are not valid JSON: {e}")))?;
    match AttrValue::try_from(value)? {
        AttrValue::Map(map) => Ok(map),
        _ => Err(KnowledgeError::validation("attributes must be a JSON object")),
    }
}

/// Canonical encoding of a whole attribute map.
pub fn canonical_attributes(attrs: &Attributes) -> Vec<u8> {
    let mut out = Vec::new();
    write_map(&mut out, attrs);
    out
}

fn write_map(out: &mut Vec<u8>, map: &BTreeMap<String, AttrValue>) {
    out.extend_from_slice(&(map.len() as u64).to_le_bytes());
    for (key, value) in map {
        write_bytes(out, key.as_bytes());
        value.write_canonical(out);
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
}
