use gsrunner::logging::LogBackend;
use gsrunner::registry::{RegistrySnapshot, ServiceRegistry};
use gsrunner::RunnerError;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Log backend that only counts calls.
#[derive(Clone, Default)]
pub struct CountingBackend {
    pub joins: Arc<AtomicUsize>,
    pub levels: Arc<Mutex<Vec<String>>>,
}

impl CountingBackend {
    pub fn joins(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }
}

impl LogBackend for CountingBackend {
    fn open_sink(&mut self, _dir: &Path, _name: &str, _max_size: u64) -> Result<(), RunnerError> {
        Ok(())
    }

    fn set_level(&mut self, level: &str) -> Result<(), RunnerError> {
        self.levels.lock().push(level.to_string());
        Ok(())
    }

    fn join(&mut self) {
        self.joins.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry that records every published snapshot.
#[derive(Default)]
pub struct RecordingRegistry {
    pub updates: Mutex<Vec<RegistrySnapshot>>,
}

impl ServiceRegistry for RecordingRegistry {
    fn update(&self, snapshot: RegistrySnapshot) {
        self.updates.lock().push(snapshot);
    }
}

/// Shared buffer that a scoped `fmt` subscriber writes into.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Run `f` with a subscriber that records every event into this buffer.
    pub fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        let buffer = self.buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || BufferWriter(buffer.clone()))
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
