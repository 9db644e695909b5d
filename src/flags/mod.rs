//! Typed flag declarations.
//!
//! A flag has a short name (what appears on the command line) and a
//! fully-qualified name (the dotted key its value is stored under in
//! [`Settings`](crate::config::Settings)). Both must be unique within one
//! [`Registrar`].

pub mod parse;

use crate::error::RunnerError;
use std::collections::HashMap;
use std::fmt;

pub use parse::{normalize_args, parse_args, ParsedFlags, ResolvedFlag};

/// Fully-qualified key of the log root path.
pub const LOG_ROOT_KEY: &str = "gsrunner.log";
/// Fully-qualified key of the log level.
pub const LOG_LEVEL_KEY: &str = "gsrunner.log.level";
/// Fully-qualified key of the log rotation size in bytes. Config file only.
pub const LOG_MAX_SIZE_KEY: &str = "gsrunner.log.maxsize";
/// Fully-qualified key of the profiling listen address.
pub const PPROF_KEY: &str = "gsrunner.pprof";
/// Fully-qualified key of the config file path.
pub const CONFIG_KEY: &str = "gsrunner.config";
/// Fully-qualified key of the registry file path.
pub const REGISTRY_KEY: &str = "gsrunner.registry";

/// Short name of the config file flag, read before the store exists.
pub const CONFIG_FLAG: &str = "config";

const BUILTIN_FLAGS: [(&str, &str, &str); 5] = [
    ("log", LOG_ROOT_KEY, "the gsrunner log root path"),
    ("level", LOG_LEVEL_KEY, "the gsrunner log level"),
    ("pprof", PPROF_KEY, "set gsrunner pprof listen address"),
    (CONFIG_FLAG, CONFIG_KEY, "set gsrunner config file"),
    ("registry", REGISTRY_KEY, "set the rpc services registry file"),
];

/// Value type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    String,
    Int,
    Uint,
    Float32,
    Float64,
    Seconds,
    Milliseconds,
}

impl FlagKind {
    /// Placeholder shown in usage output.
    pub fn value_name(self) -> &'static str {
        match self {
            FlagKind::String => "STRING",
            FlagKind::Int => "INT",
            FlagKind::Uint => "UINT",
            FlagKind::Float32 | FlagKind::Float64 => "FLOAT",
            FlagKind::Seconds => "SECONDS",
            FlagKind::Milliseconds => "MILLISECONDS",
        }
    }

    /// Whether a leading `-` on the value is a sign rather than another flag.
    pub fn is_signed(self) -> bool {
        matches!(self, FlagKind::Int | FlagKind::Float32 | FlagKind::Float64)
    }
}

/// A resolved or default flag value.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    String(String),
    Int(i64),
    Uint(u64),
    Float32(f32),
    Float64(f64),
    Seconds(u64),
    Milliseconds(u64),
}

impl FlagValue {
    pub fn kind(&self) -> FlagKind {
        match self {
            FlagValue::String(_) => FlagKind::String,
            FlagValue::Int(_) => FlagKind::Int,
            FlagValue::Uint(_) => FlagKind::Uint,
            FlagValue::Float32(_) => FlagKind::Float32,
            FlagValue::Float64(_) => FlagKind::Float64,
            FlagValue::Seconds(_) => FlagKind::Seconds,
            FlagValue::Milliseconds(_) => FlagKind::Milliseconds,
        }
    }

    /// Value as stored in the configuration store. Float32 is widened to f64;
    /// durations are stored as their integer count.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FlagValue::String(v) => serde_json::Value::from(v.as_str()),
            FlagValue::Int(v) => serde_json::Value::from(*v),
            FlagValue::Uint(v) | FlagValue::Seconds(v) | FlagValue::Milliseconds(v) => {
                serde_json::Value::from(*v)
            }
            FlagValue::Float32(v) => serde_json::Value::from(f64::from(*v)),
            FlagValue::Float64(v) => serde_json::Value::from(*v),
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::String(v) => write!(f, "{}", v),
            FlagValue::Int(v) => write!(f, "{}", v),
            FlagValue::Uint(v) | FlagValue::Seconds(v) | FlagValue::Milliseconds(v) => {
                write!(f, "{}", v)
            }
            FlagValue::Float32(v) => write!(f, "{}", v),
            FlagValue::Float64(v) => write!(f, "{}", v),
        }
    }
}

/// A declared flag.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSpec {
    pub name: String,
    pub full_name: String,
    pub default: FlagValue,
    pub description: String,
}

impl FlagSpec {
    pub fn new(
        name: impl Into<String>,
        full_name: impl Into<String>,
        default: FlagValue,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            default,
            description: description.into(),
        }
    }

    pub fn kind(&self) -> FlagKind {
        self.default.kind()
    }
}

/// Append-only set of declared flags.
#[derive(Debug, Default)]
pub struct Registrar {
    specs: Vec<FlagSpec>,
    /// short name -> fully-qualified name
    full_names: HashMap<String, String>,
}

impl Registrar {
    /// Create a registrar with no flags declared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registrar holding the runner's built-in flags.
    pub fn with_builtins() -> Self {
        let mut registrar = Self::new();
        for (name, full_name, description) in BUILTIN_FLAGS {
            registrar.insert(FlagSpec::new(
                name,
                full_name,
                FlagValue::String(String::new()),
                description,
            ));
        }
        registrar
    }

    /// Declare a flag.
    ///
    /// Fails if the short name or the fully-qualified name is already taken.
    pub fn declare(&mut self, spec: FlagSpec) -> Result<(), RunnerError> {
        if self.full_names.contains_key(&spec.name) {
            return Err(RunnerError::DuplicateFlag(spec.name));
        }
        if self.full_names.values().any(|v| *v == spec.full_name) {
            return Err(RunnerError::DuplicateFullName(spec.full_name));
        }
        self.insert(spec);
        Ok(())
    }

    fn insert(&mut self, spec: FlagSpec) {
        self.full_names
            .insert(spec.name.clone(), spec.full_name.clone());
        self.specs.push(spec);
    }

    /// Declared flags in declaration order.
    pub fn specs(&self) -> &[FlagSpec] {
        &self.specs
    }

    pub fn full_name(&self, name: &str) -> Option<&str> {
        self.full_names.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.full_names.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
