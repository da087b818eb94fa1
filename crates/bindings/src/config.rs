//! Connection descriptors.
//!
//! A binding is constructed from a [`Settings`] map. Each strategy parses the
//! map into its own typed settings and fails with a configuration error when
//! a required key is missing, before any backend is contacted.
//!
//! # Common keys
//!
//! | Key | Bindings | Description |
//! |-----|----------|-------------|
//! | `binding` | all | Strategy: `orm`, `directory` or `rest` (used by [`open_binding`](crate::open_binding)) |
//! | `class` | orm | Entity name |
//! | `path` | orm | SQLite database file, or `:memory:` |
//! | `username`, `password` | directory, rest | Credentials |
//! | `domain` | directory | Directory domain, derived from `username` when absent |
//! | `url`, `resource` | rest | Base URL and resource path segment |

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::BackendKind;
use crate::error::{BindingError, BindingResult};
use crate::types::FieldMap;

/// A backend connection descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(FieldMap);

impl Settings {
    /// Creates empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a setting.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Loads settings from a JSON file holding one object.
    pub fn from_file(path: impl AsRef<Path>) -> BindingResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BindingError::invalid_settings(format!(
                "cannot read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&text)
    }

    /// Parses settings from a JSON object.
    pub fn from_json(text: &str) -> BindingResult<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(BindingError::invalid_settings(format!(
                "settings must be a JSON object, got {}",
                type_name(&other)
            ))),
            Err(e) => Err(BindingError::invalid_settings(format!(
                "settings are not valid JSON: {}",
                e
            ))),
        }
    }

    /// Returns a raw setting.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` if `key` is present and not null.
    pub fn contains(&self, key: &str) -> bool {
        !matches!(self.0.get(key), None | Some(Value::Null))
    }

    /// Removes a setting, returning its value.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns a non-empty string setting, if present.
    ///
    /// Numbers are accepted and rendered as text.
    pub fn optional_str(&self, backend: BackendKind, key: &str) -> BindingResult<Option<String>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(wrong_type(backend, key, "a string", other)),
        }
    }

    /// Returns a non-empty string setting, failing if it is missing.
    pub fn require_str(&self, backend: BackendKind, key: &str) -> BindingResult<String> {
        self.optional_str(backend, key)?
            .ok_or_else(|| BindingError::missing_setting(backend, key))
    }

    /// Returns a boolean setting.
    ///
    /// Accepts JSON booleans and the strings `true`/`false`/`1`/`0`.
    pub fn optional_bool(&self, backend: BackendKind, key: &str) -> BindingResult<Option<bool>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(wrong_type(backend, key, "a boolean", &Value::String(s.clone()))),
            },
            Some(other) => Err(wrong_type(backend, key, "a boolean", other)),
        }
    }

    /// Returns a non-negative integer setting.
    pub fn optional_u64(&self, backend: BackendKind, key: &str) -> BindingResult<Option<u64>> {
        const EXPECTED: &str = "a non-negative integer";
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value @ Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| wrong_type(backend, key, EXPECTED, value)),
            Some(value @ Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| wrong_type(backend, key, EXPECTED, value)),
            Some(other) => Err(wrong_type(backend, key, EXPECTED, other)),
        }
    }

    /// Returns an object setting whose values are all strings.
    pub fn optional_string_map(
        &self,
        backend: BackendKind,
        key: &str,
    ) -> BindingResult<Vec<(String, String)>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    Value::Number(_) | Value::Bool(_) => Ok((k.clone(), v.to_string())),
                    other => Err(wrong_type(backend, &format!("{}.{}", key, k), "a scalar", other)),
                })
                .collect(),
            Some(other) => Err(wrong_type(backend, key, "an object", other)),
        }
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &FieldMap {
        &self.0
    }
}

impl From<FieldMap> for Settings {
    fn from(map: FieldMap) -> Self {
        Self(map)
    }
}

fn wrong_type(backend: BackendKind, key: &str, expected: &str, got: &Value) -> BindingError {
    BindingError::configuration(
        backend,
        format!("setting '{}' must be {}, got {}", key, expected, type_name(got)),
    )
}

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
