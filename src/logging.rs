//! Logging System
//!
//! Structured logging through the `tracing` crate. The runner talks to logging
//! through [`LogBackend`]: open a file sink under a directory, change the
//! active level, and join (flush) on the way out. [`TracingBackend`] is the
//! default implementation on top of `tracing-subscriber`.

use crate::error::RunnerError;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::dispatcher::{self, DefaultGuard, Dispatch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable seeding the initial filter before a level is set.
pub const LOG_ENV: &str = "GSRUNNER_LOG";

/// Contract between the runner and the logging subsystem.
pub trait LogBackend {
    /// Route log output to a file named after `name` inside `dir`.
    /// A non-zero `max_size` rotates the file once it grows past that many bytes.
    fn open_sink(&mut self, dir: &Path, name: &str, max_size: u64) -> Result<(), RunnerError>;

    /// Change the active verbosity.
    fn set_level(&mut self, level: &str) -> Result<(), RunnerError>;

    /// Flush every outstanding sink.
    fn join(&mut self);
}

/// Parse a level name. Accepts the `tracing` names plus `verbose` and `warning`.
pub fn parse_level(level: &str) -> Result<LevelFilter, RunnerError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" | "verbose" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        other => Err(RunnerError::Logging(format!(
            "Invalid log level: {} (must be 'trace', 'debug', 'info', 'warn', 'error' or 'off')",
            other
        ))),
    }
}

/// Resolve `root` to an absolute path and split it into directory and base name.
pub fn split_log_path(root: &str) -> Result<(PathBuf, String), RunnerError> {
    let absolute = std::path::absolute(root).map_err(|e| {
        RunnerError::Logging(format!("Failed to resolve log path {}: {}", root, e))
    })?;
    let cleaned = clean(dunce::simplified(&absolute));

    let name = cleaned
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| RunnerError::Logging(format!("Log path has no file name: {}", root)))?;
    let dir = cleaned
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    Ok((dir, name))
}

// Lexical cleanup of `.` and `..` without touching the filesystem.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Log file with optional size-based rotation.
///
/// The active file is `<dir>/<name>` when `name` has an extension and
/// `<dir>/<name>.log` otherwise. Rotated files get a UTC timestamp inserted
/// before the extension.
pub struct RollingFile {
    path: PathBuf,
    file: BufWriter<File>,
    written: u64,
    max_size: u64,
}

impl RollingFile {
    pub fn open(dir: &Path, name: &str, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = if Path::new(name).extension().is_some() {
            dir.join(name)
        } else {
            dir.join(format!("{}.log", name))
        };
        let file = Self::open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            file: BufWriter::new(file),
            written,
            max_size,
        })
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rotated_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("log");
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("log");
        let mut rotated = self.path.with_file_name(format!("{}.{}.{}", stem, stamp, ext));
        let mut counter = 1;
        while rotated.exists() {
            rotated = self
                .path
                .with_file_name(format!("{}.{}-{}.{}", stem, stamp, counter, ext));
            counter += 1;
        }
        rotated
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, self.rotated_path())?;
        self.file = BufWriter::new(Self::open_append(&self.path)?);
        self.written = 0;
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_size > 0 && self.written > 0 && self.written + buf.len() as u64 > self.max_size
        {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writer shared between the `fmt` layer and the backend.
///
/// Writes go to stderr until a file is attached.
#[derive(Clone, Default)]
pub struct SinkWriter {
    file: Arc<Mutex<Option<RollingFile>>>,
}

impl SinkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, file: RollingFile) {
        *self.file.lock() = Some(file);
    }

    pub fn is_attached(&self) -> bool {
        self.file.lock().is_some()
    }

    pub fn flush(&self) -> io::Result<()> {
        if let Some(file) = self.file.lock().as_mut() {
            file.flush()?;
        }
        io::stderr().flush()
    }
}

/// Per-event handle returned by [`SinkWriter`].
pub struct SinkHandle {
    file: Arc<Mutex<Option<RollingFile>>>,
}

impl Write for SinkHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.lock().as_mut() {
            Some(file) => file.write(buf),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.lock().as_mut() {
            Some(file) => file.flush(),
            None => io::stderr().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for SinkWriter {
    type Writer = SinkHandle;

    fn make_writer(&'a self) -> Self::Writer {
        SinkHandle {
            file: self.file.clone(),
        }
    }
}

/// `tracing-subscriber` backed implementation of [`LogBackend`].
pub struct TracingBackend {
    writer: SinkWriter,
    filter: reload::Handle<EnvFilter, Registry>,
    // Set when another global subscriber was already installed; the runner's
    // subscriber is then the thread's default until the backend is dropped.
    scoped: Option<DefaultGuard>,
}

impl TracingBackend {
    /// Install the global subscriber.
    ///
    /// If another global subscriber is already installed (as in tests) the
    /// same subscriber becomes the default for the current thread instead,
    /// for as long as the backend lives.
    pub fn install() -> Self {
        let writer = SinkWriter::new();
        let initial =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let (filter_layer, filter) = reload::Layer::new(initial);

        let dispatch = Dispatch::new(
            Registry::default().with(filter_layer).with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(writer.clone()),
            ),
        );
        let scoped = match dispatch.clone().try_init() {
            Ok(()) => None,
            Err(_) => Some(dispatcher::set_default(&dispatch)),
        };

        Self {
            writer,
            filter,
            scoped,
        }
    }

    pub fn writer(&self) -> &SinkWriter {
        &self.writer
    }

    /// Whether the subscriber was installed globally rather than per thread.
    pub fn is_global(&self) -> bool {
        self.scoped.is_none()
    }
}

impl LogBackend for TracingBackend {
    fn open_sink(&mut self, dir: &Path, name: &str, max_size: u64) -> Result<(), RunnerError> {
        let file = RollingFile::open(dir, name, max_size).map_err(|e| {
            RunnerError::Logging(format!(
                "Failed to open log file {} in {}: {}",
                name,
                dir.display(),
                e
            ))
        })?;
        tracing::debug!(path = %file.path().display(), "log sink opened");
        self.writer.attach(file);
        Ok(())
    }

    fn set_level(&mut self, level: &str) -> Result<(), RunnerError> {
        let level = parse_level(level)?;
        self.filter
            .reload(EnvFilter::new(level.to_string()))
            .map_err(|e| RunnerError::Logging(format!("Failed to set log level: {}", e)))
    }

    fn join(&mut self) {
        if let Err(e) = self.writer.flush() {
            eprintln!("failed to flush log sink: {}", e);
        }
    }
}
