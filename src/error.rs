//! Error types for runner startup and registry loading.

use std::path::PathBuf;
use thiserror::Error;

/// Startup errors. Every variant except `Help` is fatal: the runner shuts
/// logging down and the caller is expected to terminate the process.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("duplicate flag name :{0}")]
    DuplicateFlag(String),

    #[error("duplicate flag fullname :{0}")]
    DuplicateFullName(String),

    #[error("flag error: {0}")]
    Flag(String),

    /// `--help` was requested; carries the rendered usage.
    #[error("{0}")]
    Help(String),

    #[error("load config file error :{}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("logging error: {0}")]
    Logging(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Registry file errors.
///
/// `line` is the number of lines consumed successfully before the failing one.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("open registry file error :{}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read registry file error :{label}: {source}")]
    Read {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error("load registry file error:\n\tinvalid format\n\t{label}({line})")]
    InvalidFormat { label: String, line: usize },

    #[error("load registry file error:\n\tinvalid id {value}\n\t{label}({line})")]
    InvalidId {
        label: String,
        line: usize,
        value: String,
    },

    #[error("load registry file error:\n\tid out of range\n\t{label}({line})")]
    OutOfRange { label: String, line: usize },
}

impl RegistryError {
    /// Line index carried by format errors, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            RegistryError::InvalidFormat { line, .. }
            | RegistryError::InvalidId { line, .. }
            | RegistryError::OutOfRange { line, .. } => Some(*line),
            RegistryError::Open { .. } | RegistryError::Read { .. } => None,
        }
    }
}
