//! Layered plugin configuration.
//!
//! Configuration reaches a plugin from three places: the pipeline it runs
//! in, the stage that invokes it, and the individual `run` call. The layers
//! are merged with a fixed precedence: call-level overrides stage-level
//! overrides pipeline-level.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A string-keyed configuration mapping with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(HashMap<String, serde_json::Value>);

impl ConfigMap {
    /// Creates an empty configuration map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sets a value.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    /// Sets a value, builder-style.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.set(key, value);
        self
    }

    /// Gets a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Gets a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Gets an unsigned integer value.
    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(serde_json::Value::as_u64)
    }

    /// Gets a float value.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Gets a boolean value.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(serde_json::Value::as_bool)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Copies every entry of `other` into this map, overwriting on conflict.
    pub fn merge_from(&mut self, other: &ConfigMap) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl From<HashMap<String, serde_json::Value>> for ConfigMap {
    fn from(map: HashMap<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, serde_json::Value)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The three configuration layers seen by one plugin invocation.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    /// Pipeline-level configuration.
    pub pipeline: ConfigMap,
    /// Stage-level configuration.
    pub stage: ConfigMap,
    /// Call-level configuration.
    pub call: ConfigMap,
}

impl ConfigLayers {
    /// Creates a new set of layers.
    #[must_use]
    pub fn new(pipeline: ConfigMap, stage: ConfigMap, call: ConfigMap) -> Self {
        Self {
            pipeline,
            stage,
            call,
        }
    }

    /// Merges the layers into a single map.
    ///
    /// Precedence: call over stage over pipeline.
    #[must_use]
    pub fn merged(&self) -> ConfigMap {
        let mut merged = self.pipeline.clone();
        merged.merge_from(&self.stage);
        merged.merge_from(&self.call);
        merged
    }
}
