//! 属性容器：有序字段集合的序列化、类型转换与合并。
//!
//! Attribute containers.
//!
//! Profiles, vector indexes and conversations all carry an ordered set of
//! optional fields that travel to the service as one flat JSON object and come
//! back as `(attribute_name, attribute_value)` rows of text or large objects.
//! [`AttributeContainer`] gives every container the same payload, coercion and
//! merge behaviour, driven by a static table of [`FieldKind`]s.
//!
//! ## Example
//!
//! ```rust
//! use select_ai_rust::attributes::AttributeContainer;
//! use select_ai_rust::ProfileAttributes;
//!
//! let base = ProfileAttributes { temperature: Some(0.2), ..Default::default() };
//! let overrides = ProfileAttributes { max_tokens: Some(512), ..Default::default() };
//! let merged = base.merge(&overrides).unwrap();
//! assert_eq!(merged.temperature, Some(0.2));
//! assert_eq!(merged.max_tokens, Some(512));
//! ```

use crate::error::{Error, ErrorContext};
use crate::gateway::Row;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Wire type of a container field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Str,
    Int,
    Float,
    Bool,
    /// Inline JSON object (sent as JSON, read back as JSON text)
    Json,
    /// List of JSON objects
    JsonList,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Str => "string",
            FieldKind::Int => "integer",
            FieldKind::Float => "float",
            FieldKind::Bool => "boolean",
            FieldKind::Json => "json object",
            FieldKind::JsonList => "json list",
        };
        f.write_str(name)
    }
}

/// An ordered set of optional, typed fields.
///
/// Implementors provide the field table and the payload conversions; merge,
/// dynamic updates and JSON rendering come for free.
pub trait AttributeContainer:
    Clone + PartialEq + Default + fmt::Debug + Send + Sync + 'static
{
    /// Every wire name the container understands, in payload order.
    fn fields() -> &'static [(&'static str, FieldKind)];

    fn field_kind(name: &str) -> Option<FieldKind> {
        Self::fields()
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, kind)| *kind)
    }

    /// Flat payload. Absent fields appear as `null` only when `exclude_null` is false.
    fn to_payload(&self, exclude_null: bool) -> Result<Map<String, Value>>;

    /// Builds the container from a flat payload. Names are case-insensitive,
    /// values are coerced by the field table and unknown names are dropped.
    fn from_payload(payload: Map<String, Value>) -> Result<Self>;

    fn to_json(&self, exclude_null: bool) -> Result<String> {
        Ok(serde_json::to_string(&Value::Object(
            self.to_payload(exclude_null)?,
        ))?)
    }

    /// Copy of `self` where every field set in `overrides` wins.
    fn merge(&self, overrides: &Self) -> Result<Self> {
        let mut payload = self.to_payload(false)?;
        for (name, value) in overrides.to_payload(true)? {
            payload.insert(name, value);
        }
        Self::from_payload(payload)
    }

    /// Sets one field by wire name, validating the name and value.
    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        let key = name.to_ascii_lowercase();
        let kind = Self::field_kind(&key).ok_or_else(|| unknown_field(&key))?;
        let coerced = coerce(kind, &key, value)?;
        let mut payload = self.to_payload(false)?;
        payload.insert(key, coerced);
        *self = Self::from_payload(payload)?;
        Ok(())
    }
}

pub(crate) fn unknown_field(name: &str) -> Error {
    Error::validation_with_context(
        "unknown attribute",
        ErrorContext::new()
            .with_field_path(name)
            .with_source("attributes"),
    )
}

fn type_mismatch(kind: FieldKind, name: &str, value: &Value) -> Error {
    Error::validation_with_context(
        format!("expected {}", kind),
        ErrorContext::new()
            .with_field_path(name)
            .with_details(format!("got {}", value)),
    )
}

// 2^63 is exact as f64; anything at or past it would saturate.
fn whole_i64(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < -(i64::MIN as f64);
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// Coerces `value` to the representation of `kind`.
///
/// Remote reads deliver every attribute as text, so numbers, booleans and
/// JSON documents are parsed out of strings here.
pub fn coerce(kind: FieldKind, name: &str, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let coerced = match kind {
        FieldKind::Str => match value {
            Value::String(_) => value,
            Value::Bool(b) => Value::String(b.to_string()),
            Value::Number(ref n) => Value::String(n.to_string()),
            other => return Err(type_mismatch(kind, name, &other)),
        },
        FieldKind::Int => match &value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Value::from(i),
                None => match n.as_f64().and_then(whole_i64) {
                    Some(i) => Value::from(i),
                    None => return Err(type_mismatch(kind, name, &value)),
                },
            },
            Value::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Value::from(i)
                } else {
                    match s.parse::<f64>().ok().and_then(whole_i64) {
                        Some(i) => Value::from(i),
                        None => return Err(type_mismatch(kind, name, &value)),
                    }
                }
            }
            _ => return Err(type_mismatch(kind, name, &value)),
        },
        FieldKind::Float => match &value {
            Value::Number(n) => match n.as_f64() {
                Some(f) => Value::from(f),
                None => return Err(type_mismatch(kind, name, &value)),
            },
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) => Value::from(f),
                Err(_) => return Err(type_mismatch(kind, name, &value)),
            },
            _ => return Err(type_mismatch(kind, name, &value)),
        },
        FieldKind::Bool => match &value {
            Value::Bool(_) => value,
            Value::Number(n) => match n.as_i64() {
                Some(0) => Value::Bool(false),
                Some(1) => Value::Bool(true),
                _ => return Err(type_mismatch(kind, name, &value)),
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Value::Bool(true),
                "false" | "no" | "n" | "0" => Value::Bool(false),
                _ => return Err(type_mismatch(kind, name, &value)),
            },
            _ => return Err(type_mismatch(kind, name, &value)),
        },
        FieldKind::Json => match value {
            Value::Object(_) => value,
            Value::String(ref s) => match serde_json::from_str::<Value>(s) {
                Ok(parsed @ Value::Object(_)) => parsed,
                _ => return Err(type_mismatch(kind, name, &value)),
            },
            other => return Err(type_mismatch(kind, name, &other)),
        },
        FieldKind::JsonList => match value {
            Value::Array(items) if items.iter().all(Value::is_object) => Value::Array(items),
            Value::String(ref s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) if items.iter().all(Value::is_object) => {
                    Value::Array(items)
                }
                _ => return Err(type_mismatch(kind, name, &value)),
            },
            other => return Err(type_mismatch(kind, name, &other)),
        },
    };
    Ok(coerced)
}

/// Lower-cases names, coerces known fields and drops unknown ones.
pub(crate) fn normalize_payload<A: AttributeContainer>(
    payload: Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut known = Map::new();
    for (name, value) in payload {
        let key = name.to_ascii_lowercase();
        match A::field_kind(&key) {
            Some(kind) => {
                let coerced = coerce(kind, &key, value)?;
                known.insert(key, coerced);
            }
            None => debug!(attribute = %key, "ignoring unrecognized attribute"),
        }
    }
    Ok(known)
}

/// Payload of a serde-derived container, in field-table order.
pub(crate) fn serde_to_payload<T: Serialize>(
    value: &T,
    exclude_null: bool,
) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .filter(|(_, v)| !(exclude_null && v.is_null()))
            .collect()),
        other => Err(Error::runtime_with_context(
            "attribute container did not serialize to an object",
            ErrorContext::new().with_details(other.to_string()),
        )),
    }
}

pub(crate) fn serde_from_payload<T: DeserializeOwned>(payload: Map<String, Value>) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(payload))?)
}

/// Builds a container from `(attribute_name, attribute_value)` rows,
/// draining large-object values.
pub async fn collect_remote_fields<A: AttributeContainer>(
    rows: Vec<Row>,
    chunk_size: usize,
) -> Result<A> {
    let mut payload = Map::new();
    for row in rows {
        let (name, value) = row.into_pair()?;
        let Some(name) = name.into_text(chunk_size).await? else {
            continue;
        };
        let value = value.into_json(chunk_size).await?;
        payload.insert(name.to_ascii_lowercase(), value);
    }
    A::from_payload(payload)
}

/// Bind value for a single-attribute write: structured values go as JSON text.
pub(crate) fn to_param_value(value: Value) -> Result<Value> {
    match value {
        Value::Array(_) | Value::Object(_) => Ok(Value::String(serde_json::to_string(&value)?)),
        scalar => Ok(scalar),
    }
}
