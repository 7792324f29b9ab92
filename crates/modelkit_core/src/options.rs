//! Opaque option bag passed through every lifecycle phase.
//!
//! # Responsibility
//! - Carry host-defined key/value settings from the host to initializers
//!   and extension hooks.
//!
//! # Invariants
//! - The library never interprets option keys; it only passes them along.
//! - Key insertion order is preserved.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Host-defined configuration for one lifecycle run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: Map<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a JSON object document.
    ///
    /// # Errors
    /// - Returns [`OptionsError::Json`] when `raw` is not valid JSON.
    /// - Returns [`OptionsError::NotAnObject`] when the document is not an object.
    pub fn from_json_str(raw: &str) -> Result<Self, OptionsError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| OptionsError::Json(err.to_string()))?;
        Self::from_value(value)
    }

    /// Converts one JSON value into options; only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self, OptionsError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(OptionsError::NotAnObject(json_kind(&other))),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts one value and returns the previous value for that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Option bag parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    Json(String),
    NotAnObject(&'static str),
}

impl Display for OptionsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(details) => write!(f, "options are not valid json: {details}"),
            Self::NotAnObject(kind) => write!(f, "options must be a json object, got {kind}"),
        }
    }
}

impl Error for OptionsError {}
