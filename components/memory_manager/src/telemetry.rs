//! Telemetry sinks for allocation and collection events.
//!
//! The graph reports the live-node count after every allocation and release,
//! and the collector reports a pass marker after every completed cycle.
//! [`LogTelemetry`] writes the line-oriented logs read by the offline plotting
//! tools: `memory_usage` gets one integer per line, `progress` one `P` per
//! cycle.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Receiver of allocation and collection events.
///
/// Sinks are called outside the free-list lock but may be called from the
/// collector thread and any mutator thread at once.
pub trait TelemetrySink: Send + Sync {
    /// Live-node count after an allocation or release.
    fn live_nodes(&self, count: usize);

    /// A collection cycle finished.
    fn pass_complete(&self, cycle: u64);

    /// Pushes buffered output to its destination.
    fn flush(&self) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn live_nodes(&self, _count: usize) {}

    fn pass_complete(&self, _cycle: u64) {}
}

/// One recorded telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// Live-node count after an allocation or release
    LiveNodes(usize),
    /// A cycle completed
    PassComplete(u64),
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Returns only the live-node counts.
    pub fn live_counts(&self) -> Vec<usize> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::LiveNodes(count) => Some(*count),
                TelemetryEvent::PassComplete(_) => None,
            })
            .collect()
    }

    /// Returns the number of pass markers recorded.
    pub fn passes(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, TelemetryEvent::PassComplete(_)))
            .count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn live_nodes(&self, count: usize) {
        self.events.lock().push(TelemetryEvent::LiveNodes(count));
    }

    fn pass_complete(&self, cycle: u64) {
        self.events.lock().push(TelemetryEvent::PassComplete(cycle));
    }
}

type LogWriter = Mutex<BufWriter<Box<dyn Write + Send>>>;

/// Appends events to two line-oriented logs.
pub struct LogTelemetry {
    memory: LogWriter,
    progress: LogWriter,
}

impl LogTelemetry {
    /// File name of the live-node log.
    pub const MEMORY_FILE: &'static str = "memory_usage";
    /// File name of the pass-marker log.
    pub const PROGRESS_FILE: &'static str = "progress";
    /// Line written per completed cycle.
    pub const PASS_MARKER: &'static str = "P";

    /// Opens (appending) `memory_usage` and `progress` inside `dir`.
    pub fn create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let memory = Self::open_append(&dir.join(Self::MEMORY_FILE))?;
        let progress = Self::open_append(&dir.join(Self::PROGRESS_FILE))?;
        Ok(Self::from_writers(Box::new(memory), Box::new(progress)))
    }

    /// Wraps arbitrary writers.
    pub fn from_writers(memory: Box<dyn Write + Send>, progress: Box<dyn Write + Send>) -> Self {
        LogTelemetry {
            memory: Mutex::new(BufWriter::new(memory)),
            progress: Mutex::new(BufWriter::new(progress)),
        }
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn append(writer: &LogWriter, line: std::fmt::Arguments<'_>, log: &'static str) {
        if let Err(err) = writeln!(writer.lock(), "{line}") {
            tracing::warn!(log, error = %err, "telemetry write failed");
        }
    }
}

impl TelemetrySink for LogTelemetry {
    fn live_nodes(&self, count: usize) {
        Self::append(&self.memory, format_args!("{count}"), Self::MEMORY_FILE);
    }

    fn pass_complete(&self, _cycle: u64) {
        Self::append(
            &self.progress,
            format_args!("{}", Self::PASS_MARKER),
            Self::PROGRESS_FILE,
        );
    }

    fn flush(&self) {
        for (writer, log) in [
            (&self.memory, Self::MEMORY_FILE),
            (&self.progress, Self::PROGRESS_FILE),
        ] {
            if let Err(err) = writer.lock().flush() {
                tracing::warn!(log, error = %err, "telemetry flush failed");
            }
        }
    }
}

impl Drop for LogTelemetry {
    fn drop(&mut self) {
        self.flush();
    }
}
