//! Configuration store.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (read, flatten nested objects into dotted keys)
//!     → Settings (file values)
//!     → merge.rs (command-line flags written over file values)
//!     → Settings (read-only, handed to the entry point)
//! ```
//!
//! Keys are fully-qualified dotted names stored flat, so `gsrunner.log` and
//! `gsrunner.log.level` can both hold scalar values.

pub mod loader;
pub mod merge;

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

pub use loader::{detect_format, load_config_file, ConfigFormat};
pub use merge::{apply_flags, MergeService};

/// Flat key/value configuration store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, serde_json::Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: BTreeMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// Set `key`, returning the value it replaced.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.values.insert(key.into(), value)
    }

    pub fn get_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// String value of `key`. Scalars are rendered as text; missing keys and
    /// non-scalar values give `default`.
    pub fn string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(serde_json::Value::String(v)) => v.clone(),
            Some(serde_json::Value::Number(v)) => v.to_string(),
            Some(serde_json::Value::Bool(v)) => v.to_string(),
            _ => default.to_string(),
        }
    }

    /// Signed integer value of `key`. Numeric strings are accepted.
    pub fn int(&self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            Some(serde_json::Value::Number(v)) => v
                .as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(serde_json::Value::String(v)) => v.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Unsigned integer value of `key`. Negative values give `default`.
    pub fn uint(&self, key: &str, default: u64) -> u64 {
        self.try_uint(key).unwrap_or(default)
    }

    fn try_uint(&self, key: &str) -> Option<u64> {
        match self.values.get(key)? {
            serde_json::Value::Number(v) => v.as_u64(),
            serde_json::Value::String(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn float(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(serde_json::Value::Number(v)) => v.as_f64().unwrap_or(default),
            Some(serde_json::Value::String(v)) => v.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(serde_json::Value::Bool(v)) => *v,
            Some(serde_json::Value::String(v)) => v.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Duration of a value stored as whole seconds.
    pub fn seconds(&self, key: &str, default: Duration) -> Duration {
        self.duration(key, default, Duration::from_secs)
    }

    /// Duration of a value stored as whole milliseconds.
    pub fn milliseconds(&self, key: &str, default: Duration) -> Duration {
        self.duration(key, default, Duration::from_millis)
    }

    fn duration(&self, key: &str, default: Duration, unit: fn(u64) -> Duration) -> Duration {
        self.try_uint(key).map(unit).unwrap_or(default)
    }

    /// Deserialize the value of `key` into `T`.
    ///
    /// Returns `None` when the key is missing or the value has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
