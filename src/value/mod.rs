//! Constraint values for objquery
//!
//! Values carried by constraints form a closed set so every query can be
//! serialized totally. The wire form follows the remote store's JSON
//! conventions:
//!
//! - Scalars map directly onto JSON scalars
//! - Dates become `{"__type":"Date","iso":"..."}`
//! - Object references become `{"__type":"Pointer",...}`
//! - Geo points become `{"__type":"GeoPoint",...}`

mod geo;

pub use geo::{DistanceUnit, GeoPoint};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Number};

use crate::query::{QueryError, QueryResult};

/// Wire type tag for dates
const DATE_TYPE: &str = "Date";
/// Wire type tag for object references
const POINTER_TYPE: &str = "Pointer";

/// A typed constraint value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "serde_json::Value", try_from = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    /// Integer-exact or finite float
    Number(Number),
    String(String),
    /// UTC instant, serialized with millisecond precision
    Date(DateTime<Utc>),
    /// Reference to another stored object
    Pointer(ObjectRef),
    /// NaN or infinite float; has no wire form and fails `validate`
    NonFinite(f64),
}

impl Value {
    /// Returns the wire representation of this value
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => json!({
                "__type": DATE_TYPE,
                "iso": d.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            Value::Pointer(p) => p.to_wire(),
            Value::NonFinite(_) => serde_json::Value::Null,
        }
    }

    /// Decodes a value from its wire representation.
    ///
    /// Arrays and untyped objects are rejected.
    pub fn from_wire(value: &serde_json::Value) -> QueryResult<Self> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => Ok(Value::Number(n.clone())),
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Object(map) => match map.get("__type").and_then(|t| t.as_str()) {
                Some(DATE_TYPE) => {
                    let iso = map.get("iso").and_then(|v| v.as_str()).ok_or_else(|| {
                        QueryError::invalid_constraint("date value is missing 'iso'")
                    })?;
                    let parsed = DateTime::parse_from_rfc3339(iso).map_err(|e| {
                        QueryError::invalid_constraint(format!("invalid date '{}': {}", iso, e))
                    })?;
                    Ok(Value::Date(parsed.with_timezone(&Utc)))
                }
                Some(POINTER_TYPE) => {
                    let collection = map.get("className").and_then(|v| v.as_str());
                    let object_id = map.get("objectId").and_then(|v| v.as_str());
                    match (collection, object_id) {
                        (Some(c), Some(id)) => Ok(Value::Pointer(ObjectRef::new(c, id)?)),
                        _ => Err(QueryError::invalid_constraint(
                            "pointer value requires 'className' and 'objectId'",
                        )),
                    }
                }
                _ => Err(QueryError::invalid_constraint(
                    "object values must carry a supported '__type'",
                )),
            },
            serde_json::Value::Array(_) => Err(QueryError::invalid_constraint(
                "array values are not supported",
            )),
        }
    }

    /// Checks nested invariants: pointer parts non-empty, floats finite
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Value::Pointer(p) => p.validate(),
            Value::NonFinite(n) => Err(QueryError::invalid_constraint(format!(
                "number {} has no JSON representation",
                n
            ))),
            _ => Ok(()),
        }
    }

    /// Returns the type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Pointer(_) => "pointer",
            Value::NonFinite(_) => "non_finite_number",
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_wire()
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = QueryError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Value::from_wire(&value)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

/// NaN and infinities are kept as `NonFinite` so builders can reject them.
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::NonFinite(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<ObjectRef> for Value {
    fn from(p: ObjectRef) -> Self {
        Value::Pointer(p)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Reference to a stored object (collection + object id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    collection: String,
    object_id: String,
}

impl ObjectRef {
    /// Creates a reference; both parts must be non-empty
    pub fn new(collection: impl Into<String>, object_id: impl Into<String>) -> QueryResult<Self> {
        let reference = Self {
            collection: collection.into(),
            object_id: object_id.into(),
        };
        reference.validate()?;
        Ok(reference)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Checks that both parts are non-empty
    pub fn validate(&self) -> QueryResult<()> {
        if self.collection.trim().is_empty() {
            return Err(QueryError::invalid_constraint(
                "object reference has an empty collection",
            ));
        }
        if self.object_id.trim().is_empty() {
            return Err(QueryError::invalid_constraint(
                "object reference has an empty object id",
            ));
        }
        Ok(())
    }

    /// Returns the pointer wire form
    pub fn to_wire(&self) -> serde_json::Value {
        json!({
            "__type": POINTER_TYPE,
            "className": self.collection,
            "objectId": self.object_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scalar_wire_form() {
        assert_eq!(Value::from(18).to_wire(), json!(18));
        assert_eq!(Value::from("published").to_wire(), json!("published"));
        assert_eq!(Value::from(true).to_wire(), json!(true));
        assert_eq!(Value::Null.to_wire(), json!(null));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        assert!(matches!(Value::from(f64::NAN), Value::NonFinite(n) if n.is_nan()));
        assert_eq!(Value::from(f64::INFINITY), Value::NonFinite(f64::INFINITY));
        assert_eq!(
            Value::from(f64::NEG_INFINITY).validate().unwrap_err().code(),
            "OBJQ_INVALID_CONSTRAINT"
        );
        assert_eq!(Value::from(1.5), Value::Number(Number::from_f64(1.5).unwrap()));
        assert!(Value::from(1.5).validate().is_ok());
    }

    #[test]
    fn test_date_wire_form() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let wire = Value::from(date).to_wire();
        assert_eq!(wire["__type"], "Date");
        assert_eq!(wire["iso"], "2024-03-01T12:30:00.000Z");

        let decoded = Value::from_wire(&wire).unwrap();
        assert_eq!(decoded, Value::Date(date));
    }

    #[test]
    fn test_pointer_wire_form() {
        let pointer = ObjectRef::new("Post", "abc123").unwrap();
        let wire = Value::from(pointer.clone()).to_wire();
        assert_eq!(wire["__type"], "Pointer");
        assert_eq!(wire["className"], "Post");
        assert_eq!(wire["objectId"], "abc123");
        assert_eq!(Value::from_wire(&wire).unwrap(), Value::Pointer(pointer));
    }

    #[test]
    fn test_object_ref_rejects_empty_parts() {
        assert!(ObjectRef::new("", "abc").is_err());
        assert!(ObjectRef::new("Post", " ").is_err());
    }

    #[test]
    fn test_from_wire_rejects_arrays_and_untyped_objects() {
        assert!(Value::from_wire(&json!([1, 2])).is_err());
        assert!(Value::from_wire(&json!({"a": 1})).is_err());
        assert!(Value::from_wire(&json!({"__type": "Date", "iso": "yesterday"})).is_err());
    }

    #[test]
    fn test_serde_uses_wire_form() {
        let date = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        let encoded = serde_json::to_value(Value::from(date)).unwrap();
        assert_eq!(encoded["__type"], "Date");

        let decoded: Value = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, Value::Date(date));
    }
}
