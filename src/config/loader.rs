//! Configuration file loading from disk.

use super::Settings;
use crate::error::RunnerError;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
}

/// Format implied by the file extension, if it is one we can load.
pub fn detect_format(path: &Path) -> Option<ConfigFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Some(ConfigFormat::Json),
        _ => None,
    }
}

/// Load a JSON config file into a flat store.
///
/// Nested objects are flattened into dotted keys; keys that already contain
/// dots are kept as written.
pub fn load_config_file(path: &Path) -> Result<Settings, RunnerError> {
    let config_error = |reason: String| RunnerError::Config {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    let document: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| config_error(e.to_string()))?;

    let serde_json::Value::Object(root) = document else {
        return Err(config_error("top-level value must be an object".to_string()));
    };

    let mut values = BTreeMap::new();
    for (key, value) in root {
        flatten(key, value, &mut values);
    }
    Ok(Settings::from_values(values))
}

fn flatten(key: String, value: serde_json::Value, out: &mut BTreeMap<String, serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) if !map.is_empty() => {
            for (child, child_value) in map {
                flatten(format!("{}.{}", key, child), child_value, out);
            }
        }
        other => {
            out.insert(key, other);
        }
    }
}
