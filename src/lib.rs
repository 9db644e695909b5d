//! gsrunner: Service Bootstrap
//!
//! Declares typed command-line flags, merges them over an optional JSON config
//! file, sets up logging, loads the RPC service registry file and then hands
//! control to the service's entry point.

pub mod config;
pub mod error;
pub mod flags;
pub mod logging;
pub mod registry;
pub mod runner;

pub use config::Settings;
pub use error::{RegistryError, RunnerError};
pub use registry::{RegistrySnapshot, ServiceRegistry, SharedRegistry};
pub use runner::{exit_on_error, Runner};
