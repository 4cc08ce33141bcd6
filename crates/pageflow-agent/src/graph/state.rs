use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use pageflow_core::error::{PageflowError, Result};

/// The record threaded through one graph traversal.
///
/// Keys are field names; values are JSON so nodes can store scalars,
/// sequences or nested maps. The driver owns the state for the whole run and
/// lends it to each node in turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    data: BTreeMap<String, serde_json::Value>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: BTreeMap<String, serde_json::Value>) -> Self {
        Self { data }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Get a boolean field; absent or non-boolean reads as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.data
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Get an unsigned counter; absent reads as 0.
    pub fn counter(&self, key: &str) -> u64 {
        self.data.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
    }

    /// Deserialize a field into `T`, if present.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| PageflowError::StateField {
                    field: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Deserialize a field that must be present.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_as(key)?.ok_or_else(|| PageflowError::StateField {
            field: key.to_string(),
            message: "missing".to_string(),
        })
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Set a string value.
    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data
            .insert(key.into(), serde_json::Value::String(value.into()));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Merge a partial update: each field in `delta` overwrites the field of
    /// the same name. Fields the delta does not mention are left alone.
    pub fn apply(&mut self, delta: StateDelta) {
        self.data.extend(delta.fields);
    }

    /// Get the underlying data map.
    pub fn data(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.data
    }
}

/// A partial state update returned by a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    fields: BTreeMap<String, serde_json::Value>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StateDelta::set`].
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.set(key, value);
        self
    }

    /// Serialize `value` into the delta.
    pub fn with_value<T: Serialize>(mut self, key: impl Into<String>, value: &T) -> Result<Self> {
        self.fields.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
