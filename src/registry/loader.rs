//! Registry file loading.
//!
//! One entry per line, `NAME=ID`, where NAME is one or more `.`-separated
//! segments of `[A-Za-z0-9_]` and ID is a decimal number no larger than 65535.
//! Blank lines and comments are rejected like any other malformed line.

use super::{RegistrySnapshot, ServiceRegistry};
use crate::error::RegistryError;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use tracing::trace;

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)=(?P<id>[0-9]+)$")
        .expect("registry entry pattern is valid")
});

/// Parse every line of `reader` into a snapshot.
///
/// `label` names the source in errors. The line index in errors counts the
/// lines accepted before the failing one. Nothing is returned unless every
/// line is valid.
pub fn load<R: BufRead>(reader: R, label: &str) -> Result<RegistrySnapshot, RegistryError> {
    let mut lines = 0usize;
    let mut items = RegistrySnapshot::new();

    for line in reader.lines() {
        let line = line.map_err(|source| RegistryError::Read {
            label: label.to_string(),
            source,
        })?;

        let captures = ENTRY_PATTERN
            .captures(&line)
            .ok_or_else(|| RegistryError::InvalidFormat {
                label: label.to_string(),
                line: lines,
            })?;
        let name = &captures["name"];
        let id = &captures["id"];

        let value: i32 = id.parse().map_err(|_| RegistryError::InvalidId {
            label: label.to_string(),
            line: lines,
            value: id.to_string(),
        })?;
        let id = u16::try_from(value).map_err(|_| RegistryError::OutOfRange {
            label: label.to_string(),
            line: lines,
        })?;

        trace!(service = name, id, "registry entry");
        items.insert(name.to_string(), id);

        lines += 1;
    }

    Ok(items)
}

/// Hand a complete snapshot to the registry in a single update.
pub fn publish(registry: &dyn ServiceRegistry, snapshot: RegistrySnapshot) {
    registry.update(snapshot);
}

/// Open, load and publish the registry file at `path`.
///
/// Returns the number of services published.
pub fn load_file(path: &Path, registry: &dyn ServiceRegistry) -> Result<usize, RegistryError> {
    let file = File::open(path).map_err(|source| RegistryError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot = load(BufReader::new(file), &path.display().to_string())?;
    let count = snapshot.len();
    publish(registry, snapshot);
    Ok(count)
}
