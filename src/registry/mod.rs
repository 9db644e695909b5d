//! RPC service registry.
//!
//! # Data Flow
//! ```text
//! registry file (NAME=ID lines)
//!     → loader.rs (validate every line, build snapshot)
//!     → ServiceRegistry::update (one call, whole snapshot)
//! ```
//!
//! A load either publishes a complete snapshot or nothing.

pub mod loader;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub use loader::{load, load_file, publish};

/// Service name to id mapping produced by one load.
pub type RegistrySnapshot = HashMap<String, u16>;

/// Consumer of loaded registry snapshots.
pub trait ServiceRegistry: Send + Sync {
    /// Replace the registry contents with `snapshot`.
    fn update(&self, snapshot: RegistrySnapshot);
}

/// In-process registry. Updates swap the whole mapping.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    entries: RwLock<Arc<RegistrySnapshot>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mapping. Later updates do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.entries.read().clone()
    }

    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.entries.read().get(name).copied()
    }

    /// Name registered for `id`. Ids are not required to be unique; with
    /// duplicates, the lexicographically smallest name wins.
    pub fn name_of(&self, id: u16) -> Option<String> {
        self.entries
            .read()
            .iter()
            .filter(|(_, v)| **v == id)
            .map(|(k, _)| k)
            .min()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ServiceRegistry for SharedRegistry {
    fn update(&self, snapshot: RegistrySnapshot) {
        *self.entries.write() = Arc::new(snapshot);
    }
}
