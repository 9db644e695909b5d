//! Service runner: flags, config, logging and registry setup around an entry point.
//!
//! # Startup order
//! ```text
//! parse flags → load config file (.json only) → lay flags over config
//!     → open log sink → set log level → load registry file
//!     → entry point
//!     → "service stopped." + log join (every exit path)
//! ```

use crate::config::{MergeService, Settings};
use crate::error::RunnerError;
use crate::flags::{
    parse_args, FlagSpec, FlagValue, Registrar, LOG_LEVEL_KEY, LOG_MAX_SIZE_KEY, LOG_ROOT_KEY,
    REGISTRY_KEY,
};
use crate::logging::{split_log_path, LogBackend, TracingBackend};
use crate::registry::{self, ServiceRegistry, SharedRegistry};
use std::any::Any;
use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info, info_span};

/// Bootstraps a service and runs its entry point.
///
/// `R` is the registry that receives the loaded service ids.
pub struct Runner<R = SharedRegistry> {
    name: String,
    registrar: Registrar,
    settings: Settings,
    positional: Vec<String>,
    registry: Arc<R>,
    backend: Option<Box<dyn LogBackend>>,
}

impl Runner<SharedRegistry> {
    /// Create a runner with the built-in flags and an in-process registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registrar: Registrar::with_builtins(),
            settings: Settings::new(),
            positional: Vec::new(),
            registry: Arc::new(SharedRegistry::new()),
            backend: None,
        }
    }
}

impl<R: ServiceRegistry> Runner<R> {
    /// Publish registry snapshots to `registry` instead.
    pub fn with_registry<S: ServiceRegistry>(self, registry: Arc<S>) -> Runner<S> {
        Runner {
            name: self.name,
            registrar: self.registrar,
            settings: self.settings,
            positional: self.positional,
            registry,
            backend: self.backend,
        }
    }

    /// Use `backend` instead of installing the global tracing subscriber.
    pub fn with_log_backend(mut self, backend: Box<dyn LogBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Declare a flag. Fails if either name is already taken.
    pub fn declare(mut self, spec: FlagSpec) -> Result<Self, RunnerError> {
        self.registrar.declare(spec)?;
        Ok(self)
    }

    pub fn flag_string(
        self,
        name: &str,
        full_name: &str,
        default: &str,
        description: &str,
    ) -> Result<Self, RunnerError> {
        self.declare(FlagSpec::new(
            name,
            full_name,
            FlagValue::String(default.to_string()),
            description,
        ))
    }

    pub fn flag_int(
        self,
        name: &str,
        full_name: &str,
        default: i64,
        description: &str,
    ) -> Result<Self, RunnerError> {
        self.declare(FlagSpec::new(name, full_name, FlagValue::Int(default), description))
    }

    pub fn flag_uint(
        self,
        name: &str,
        full_name: &str,
        default: u64,
        description: &str,
    ) -> Result<Self, RunnerError> {
        self.declare(FlagSpec::new(name, full_name, FlagValue::Uint(default), description))
    }

    pub fn flag_float32(
        self,
        name: &str,
        full_name: &str,
        default: f32,
        description: &str,
    ) -> Result<Self, RunnerError> {
        self.declare(FlagSpec::new(name, full_name, FlagValue::Float32(default), description))
    }

    pub fn flag_float64(
        self,
        name: &str,
        full_name: &str,
        default: f64,
        description: &str,
    ) -> Result<Self, RunnerError> {
        self.declare(FlagSpec::new(name, full_name, FlagValue::Float64(default), description))
    }

    /// Declare a duration flag counted in seconds.
    pub fn seconds(
        self,
        name: &str,
        full_name: &str,
        default: u64,
        description: &str,
    ) -> Result<Self, RunnerError> {
        self.declare(FlagSpec::new(name, full_name, FlagValue::Seconds(default), description))
    }

    /// Declare a duration flag counted in milliseconds.
    pub fn milliseconds(
        self,
        name: &str,
        full_name: &str,
        default: u64,
        description: &str,
    ) -> Result<Self, RunnerError> {
        self.declare(FlagSpec::new(
            name,
            full_name,
            FlagValue::Milliseconds(default),
            description,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> &Registrar {
        &self.registrar
    }

    /// Resolved configuration. Empty until `run` has parsed the command line.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Arguments left over after the flags.
    pub fn args(&self) -> &[String] {
        &self.positional
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Run with the process arguments.
    pub fn run<F>(self, main: F) -> Result<(), RunnerError>
    where
        F: FnOnce(&Runner<R>) -> anyhow::Result<()>,
    {
        self.run_with_args(std::env::args_os(), main)
    }

    /// Run with explicit arguments (program name first).
    ///
    /// Startup errors are returned. Panics during startup, and errors and
    /// panics from `main`, are logged and absorbed. Either way "service
    /// stopped." is logged and the log backend joined exactly once before
    /// returning.
    pub fn run_with_args<I, T, F>(mut self, args: I, main: F) -> Result<(), RunnerError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
        F: FnOnce(&Runner<R>) -> anyhow::Result<()>,
    {
        let backend = self
            .backend
            .take()
            .unwrap_or_else(|| Box::new(TracingBackend::install()));

        let span = info_span!("runner", name = %self.name);
        let _enter = span.enter();
        let mut shutdown = ShutdownGuard { backend };

        let started = panic::catch_unwind(AssertUnwindSafe(|| {
            self.start(args, shutdown.backend.as_mut())
        }));
        match started {
            Ok(Ok(())) => {}
            Ok(Err(RunnerError::Help(usage))) => return Err(RunnerError::Help(usage)),
            Ok(Err(e)) => {
                error!("service startup failed\n\t{}", e);
                return Err(e);
            }
            Err(payload) => {
                error!("catch unknown exception\n\t{}", panic_message(&payload));
                return Ok(());
            }
        }

        info!("service started.");

        match panic::catch_unwind(AssertUnwindSafe(|| main(&self))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("service main returned error\n\t{:#}", e),
            Err(payload) => error!("catch unknown exception\n\t{}", panic_message(&payload)),
        }

        Ok(())
    }

    fn start<I, T>(&mut self, args: I, backend: &mut dyn LogBackend) -> Result<(), RunnerError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let parsed = parse_args(&self.registrar, args)?;
        self.settings = MergeService::build(&parsed)?;
        self.positional = parsed.positional;

        let log_root = self.settings.string(LOG_ROOT_KEY, "");
        debug!("log root path :{}", log_root);
        let log_level = self.settings.string(LOG_LEVEL_KEY, "");
        debug!("log level :{}", log_level);
        let registry_file = self.settings.string(REGISTRY_KEY, "");
        debug!("registry file:{}", registry_file);

        if !log_root.is_empty() {
            let (dir, name) = split_log_path(&log_root)?;
            backend.open_sink(&dir, &name, self.settings.uint(LOG_MAX_SIZE_KEY, 0))?;
        }

        if !log_level.is_empty() {
            backend.set_level(&log_level)?;
        }

        if !registry_file.is_empty() {
            info!("load gsrpc services registry file :{}", registry_file);
            let count = registry::load_file(Path::new(&registry_file), self.registry.as_ref())?;
            info!(
                services = count,
                "load gsrpc services registry file :{} -- success", registry_file
            );
        }

        Ok(())
    }
}

// Logs the final message and joins the log backend when `run` exits.
struct ShutdownGuard {
    backend: Box<dyn LogBackend>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        info!("service stopped.");
        self.backend.join();
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Print a startup error and terminate the process with status 1.
///
/// A help request prints the usage to stdout and exits with status 0.
pub fn exit_on_error(result: Result<(), RunnerError>) {
    match result {
        Ok(()) => {}
        Err(RunnerError::Help(usage)) => {
            print!("{}", usage);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
