// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Schema-less resource documents.
//!
//! Items are kept as raw JSON because the set of fields varies per resource kind.
//! Field access uses dotted paths (`spec.volumeName`) and reports two different
//! outcomes for "missing" data:
//! - `Ok(None)` when a segment of the path is absent or `null`
//! - `Err(FieldError::WrongType)` when a segment exists but is not of the expected JSON type

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// A field exists but does not have the expected shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field '{path}' is {found}, expected {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Name of the JSON type of a value, for error messages
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Walk a dotted path through nested objects
///
/// Every intermediate segment must be an object; a `null` anywhere counts as absent.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Result<Option<&'a Value>, FieldError> {
    let mut current = value;
    let mut walked = String::new();

    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let map = match current {
            Value::Object(map) => map,
            Value::Null => return Ok(None),
            other => {
                return Err(FieldError::WrongType {
                    path: if walked.is_empty() {
                        ".".to_string()
                    } else {
                        walked
                    },
                    expected: "an object",
                    found: type_name(other),
                });
            }
        };

        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(segment);

        match map.get(segment) {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }

    if current.is_null() {
        Ok(None)
    } else {
        Ok(Some(current))
    }
}

/// String field at `path`
pub fn get_str<'a>(value: &'a Value, path: &str) -> Result<Option<&'a str>, FieldError> {
    match lookup(value, path)? {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(FieldError::WrongType {
            path: path.to_string(),
            expected: "a string",
            found: type_name(other),
        }),
    }
}

/// Array field at `path`
pub fn get_array<'a>(value: &'a Value, path: &str) -> Result<Option<&'a Vec<Value>>, FieldError> {
    match lookup(value, path)? {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(FieldError::WrongType {
            path: path.to_string(),
            expected: "an array",
            found: type_name(other),
        }),
    }
}

/// Object field at `path`
pub fn get_object<'a>(
    value: &'a Value,
    path: &str,
) -> Result<Option<&'a Map<String, Value>>, FieldError> {
    match lookup(value, path)? {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(FieldError::WrongType {
            path: path.to_string(),
            expected: "an object",
            found: type_name(other),
        }),
    }
}

/// One resource instance as returned by the API server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Value);

impl Item {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[cfg(test)]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[cfg(test)]
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn get_str(&self, path: &str) -> Result<Option<&str>, FieldError> {
        get_str(&self.0, path)
    }

    pub fn get_array(&self, path: &str) -> Result<Option<&Vec<Value>>, FieldError> {
        get_array(&self.0, path)
    }

    pub fn get_object(&self, path: &str) -> Result<Option<&Map<String, Value>>, FieldError> {
        get_object(&self.0, path)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("metadata.name").ok().flatten()
    }

    /// Namespace, or the empty string for cluster-scoped resources
    pub fn namespace(&self) -> &str {
        self.get_str("metadata.namespace")
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Labels from `metadata.labels`; non-string values are ignored
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.get_object("metadata.labels")
            .ok()
            .flatten()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
