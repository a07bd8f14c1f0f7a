//! Flag values and the named flag store.
//!
//! A flag is either a single primitive (string, number, boolean) or a flat
//! object whose fields are primitives. Nesting stops there: an object flag
//! can never hold another object or an array.
//!
//! ```
//! use savedeck_logic::flag::{FieldValue, FlagValue};
//! use serde_json::json;
//!
//! let door = FlagValue::try_from(json!({"open": true, "visits": 3})).unwrap();
//! assert_eq!(door.field("visits"), Some(&FieldValue::Number(3.0)));
//!
//! assert!(FlagValue::try_from(json!({"inner": {"deep": 1}})).is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// A primitive value: the only thing an object flag's fields may hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl FieldValue {
    /// Interpret a user-typed literal: `true`/`false`, then a finite number,
    /// otherwise the raw text.
    pub fn parse_literal(raw: &str) -> Self {
        match raw.trim() {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::String(raw.to_string()),
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn from_json(value: Value, field: Option<&str>) -> Result<Self, FlagError> {
        let named = |f: fn(String) -> FlagError, top: FlagError| match field {
            Some(name) => f(name.to_string()),
            None => top,
        };
        match value {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => n.as_f64().map(Self::Number).ok_or(FlagError::NonFinite),
            Value::String(s) => Ok(Self::String(s)),
            Value::Null => Err(named(FlagError::NullField, FlagError::Null)),
            Value::Array(_) => Err(named(FlagError::NestedArray, FlagError::Array)),
            // Only reachable for fields; top-level objects are handled by FlagValue.
            Value::Object(_) => Err(FlagError::NestedObject(field.unwrap_or_default().to_string())),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => number_to_json(*n),
        }
    }
}

/// Integral numbers are written without a fractional part so files written
/// by the game keep their shape after an edit.
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Why a value cannot be stored as a flag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("flag value cannot be null")]
    Null,
    #[error("flag value cannot be an array")]
    Array,
    #[error("field `{0}` is an object; object flags may only hold strings, numbers and booleans")]
    NestedObject(String),
    #[error("field `{0}` is an array; object flags may only hold strings, numbers and booleans")]
    NestedArray(String),
    #[error("field `{0}` is null")]
    NullField(String),
    #[error("flag numbers must be finite")]
    NonFinite,
    #[error("flag `{0}` is not an object flag")]
    NotAnObject(String),
    #[error("flag document must be a JSON object, found {0}")]
    NotADocument(&'static str),
    #[error("flag `{name}`: {source}")]
    InvalidEntry {
        name: String,
        #[source]
        source: Box<FlagError>,
    },
    #[error("malformed flag document: {0}")]
    Malformed(String),
}

/// A flag value: a primitive, or a flat object of primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum FlagValue {
    Primitive(FieldValue),
    Object(BTreeMap<String, FieldValue>),
}

impl FlagValue {
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Look up a field of an object flag. Primitive flags have no fields.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        match self {
            Self::Object(fields) => fields.get(name),
            Self::Primitive(_) => None,
        }
    }

    fn check_finite(&self) -> Result<(), FlagError> {
        let finite = |v: &FieldValue| !matches!(v, FieldValue::Number(n) if !n.is_finite());
        let ok = match self {
            Self::Primitive(v) => finite(v),
            Self::Object(fields) => fields.values().all(finite),
        };
        if ok {
            Ok(())
        } else {
            Err(FlagError::NonFinite)
        }
    }
}

impl From<FieldValue> for FlagValue {
    fn from(v: FieldValue) -> Self {
        Self::Primitive(v)
    }
}

impl TryFrom<Value> for FlagValue {
    type Error = FlagError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (name, v) in map {
                    let field = FieldValue::from_json(v, Some(&name))?;
                    fields.insert(name, field);
                }
                Ok(Self::Object(fields))
            }
            other => FieldValue::from_json(other, None).map(Self::Primitive),
        }
    }
}

impl From<FlagValue> for Value {
    fn from(flag: FlagValue) -> Self {
        match flag {
            FlagValue::Primitive(v) => v.to_json(),
            FlagValue::Object(fields) => {
                let map: Map<String, Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                Value::Object(map)
            }
        }
    }
}

/// Every flag of a slot, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagStore {
    flags: BTreeMap<String, FlagValue>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a flag document (`{"name": value, ...}`).
    pub fn from_json_str(text: &str) -> Result<Self, FlagError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| FlagError::Malformed(e.to_string()))?;
        let map = match value {
            Value::Object(map) => map,
            other => return Err(FlagError::NotADocument(json_type_name(&other))),
        };

        let mut flags = BTreeMap::new();
        for (name, raw) in map {
            match FlagValue::try_from(raw) {
                Ok(flag) => {
                    flags.insert(name, flag);
                }
                Err(source) => {
                    return Err(FlagError::InvalidEntry {
                        name,
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(Self { flags })
    }

    pub fn to_json_string_pretty(&self) -> String {
        let map: Map<String, Value> = self
            .flags
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();
        // A map of strings to JSON values always serializes.
        serde_json::to_string_pretty(&Value::Object(map)).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Insert or replace a flag, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: FlagValue,
    ) -> Result<Option<FlagValue>, FlagError> {
        value.check_finite()?;
        Ok(self.flags.insert(name.into(), value))
    }

    /// Set one field of an object flag, creating the flag if it is absent.
    pub fn set_field(
        &mut self,
        name: &str,
        field: impl Into<String>,
        value: FieldValue,
    ) -> Result<(), FlagError> {
        if matches!(value, FieldValue::Number(n) if !n.is_finite()) {
            return Err(FlagError::NonFinite);
        }
        let flag = self
            .flags
            .entry(name.to_string())
            .or_insert_with(|| FlagValue::Object(BTreeMap::new()));
        match flag {
            FlagValue::Object(fields) => {
                fields.insert(field.into(), value);
                Ok(())
            }
            FlagValue::Primitive(_) => Err(FlagError::NotAnObject(name.to_string())),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FlagValue> {
        self.flags.remove(name)
    }

    /// Remove one field of an object flag.
    pub fn remove_field(&mut self, name: &str, field: &str) -> Result<Option<FieldValue>, FlagError> {
        match self.flags.get_mut(name) {
            Some(FlagValue::Object(fields)) => Ok(fields.remove(field)),
            Some(FlagValue::Primitive(_)) => Err(FlagError::NotAnObject(name.to_string())),
            None => Ok(None),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlagValue)> {
        self.flags.iter()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_are_accepted() {
        assert_eq!(
            FlagValue::try_from(json!(true)),
            Ok(FlagValue::Primitive(FieldValue::Bool(true)))
        );
        assert_eq!(
            FlagValue::try_from(json!(2.5)),
            Ok(FlagValue::Primitive(FieldValue::Number(2.5)))
        );
        assert_eq!(
            FlagValue::try_from(json!("seen")),
            Ok(FlagValue::Primitive(FieldValue::String("seen".into())))
        );
    }

    #[test]
    fn flat_object_is_accepted() {
        let flag = FlagValue::try_from(json!({"a": 1, "b": "x", "c": false})).unwrap();
        assert!(flag.is_object());
        assert_eq!(flag.field("b"), Some(&FieldValue::String("x".into())));
        assert_eq!(flag.field("missing"), None);
    }

    #[test]
    fn nested_values_are_rejected() {
        assert_eq!(
            FlagValue::try_from(json!({"inner": {"x": 1}})),
            Err(FlagError::NestedObject("inner".into()))
        );
        assert_eq!(
            FlagValue::try_from(json!({"list": [1, 2]})),
            Err(FlagError::NestedArray("list".into()))
        );
        assert_eq!(
            FlagValue::try_from(json!({"gone": null})),
            Err(FlagError::NullField("gone".into()))
        );
        assert_eq!(FlagValue::try_from(json!([1])), Err(FlagError::Array));
        assert_eq!(FlagValue::try_from(Value::Null), Err(FlagError::Null));
    }

    #[test]
    fn serde_uses_natural_json_shape() {
        let flag: FlagValue = serde_json::from_str(r#"{"hp": 10, "name": "boss"}"#).unwrap();
        let text = serde_json::to_string(&flag).unwrap();
        assert_eq!(text, r#"{"hp":10,"name":"boss"}"#);

        let bad = serde_json::from_str::<FlagValue>(r#"{"hp": {"max": 10}}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn parse_literal_picks_the_narrowest_type() {
        assert_eq!(FieldValue::parse_literal("true"), FieldValue::Bool(true));
        assert_eq!(FieldValue::parse_literal("42"), FieldValue::Number(42.0));
        assert_eq!(FieldValue::parse_literal("-0.5"), FieldValue::Number(-0.5));
        assert_eq!(FieldValue::parse_literal("NaN"), FieldValue::String("NaN".into()));
        assert_eq!(
            FieldValue::parse_literal("scene_01"),
            FieldValue::String("scene_01".into())
        );
    }

    #[test]
    fn store_set_field_creates_object_flags() {
        let mut store = FlagStore::new();
        store.set_field("gate", "open", FieldValue::Bool(true)).unwrap();
        store.set_field("gate", "uses", FieldValue::Number(2.0)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("gate").and_then(|f| f.field("uses")),
            Some(&FieldValue::Number(2.0))
        );
    }

    #[test]
    fn store_set_field_on_primitive_fails() {
        let mut store = FlagStore::new();
        store
            .insert("intro_done", FieldValue::Bool(true).into())
            .unwrap();
        assert_eq!(
            store.set_field("intro_done", "x", FieldValue::Bool(false)),
            Err(FlagError::NotAnObject("intro_done".into()))
        );
        assert_eq!(
            store.remove_field("intro_done", "x"),
            Err(FlagError::NotAnObject("intro_done".into()))
        );
    }

    #[test]
    fn store_rejects_non_finite_numbers() {
        let mut store = FlagStore::new();
        assert_eq!(
            store.insert("bad", FieldValue::Number(f64::NAN).into()),
            Err(FlagError::NonFinite)
        );
        assert_eq!(
            store.set_field("bad", "x", FieldValue::Number(f64::INFINITY)),
            Err(FlagError::NonFinite)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn document_errors_name_the_flag() {
        let err = FlagStore::from_json_str(r#"{"ok": 1, "broken": {"a": [1]}}"#).unwrap_err();
        assert_eq!(
            err,
            FlagError::InvalidEntry {
                name: "broken".into(),
                source: Box::new(FlagError::NestedArray("a".into())),
            }
        );
        assert_eq!(
            FlagStore::from_json_str("[1, 2]"),
            Err(FlagError::NotADocument("an array"))
        );
        assert!(matches!(
            FlagStore::from_json_str("{"),
            Err(FlagError::Malformed(_))
        ));
    }

    #[test]
    fn document_survives_pretty_print() {
        let text = r#"{"chest_03": {"looted": true, "gold": 120}, "intro": "done", "visits": 7}"#;
        let store = FlagStore::from_json_str(text).unwrap();
        let again = FlagStore::from_json_str(&store.to_json_string_pretty()).unwrap();
        assert_eq!(store, again);
    }
}
