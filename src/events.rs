/*!
 * Structured run events.
 *
 * Every user-facing event of a run is captured as a timestamped `LogEntry`
 * in a shared buffer and mirrored to the `log` facade. The controller reads
 * the buffer after a run to report warnings and errors.
 */

use chrono::{DateTime, Local};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Severity of a run event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl EventLevel {
    /// Uppercase label used in issue reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Success => "SUCCESS",
        }
    }
}

/// Log entry from a translation run
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// When the event happened
    pub timestamp: DateTime<Local>,
    /// Log level
    pub level: EventLevel,
    /// Log message
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.level.label(),
            self.message
        )
    }
}

/// Shared, cloneable event buffer
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl EventLog {
    /// Create an empty event log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and mirror it to the logger
    pub fn push(&self, level: EventLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            EventLevel::Info | EventLevel::Success => info!("{}", message),
            EventLevel::Warning => warn!("{}", message),
            EventLevel::Error => error!("{}", message),
        }
        self.entries.lock().push(LogEntry {
            timestamp: Local::now(),
            level,
            message,
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(EventLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(EventLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(EventLevel::Error, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(EventLevel::Success, message);
    }

    /// Snapshot of all entries in order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Warnings and errors only
    pub fn issues(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| matches!(e.level, EventLevel::Warning | EventLevel::Error))
            .cloned()
            .collect()
    }

    /// Number of entries at `level`
    pub fn count(&self, level: EventLevel) -> usize {
        self.entries.lock().iter().filter(|e| e.level == level).count()
    }
}
