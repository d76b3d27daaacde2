//! # Debug Port
//!
//! This crate implements the port that receives diagnostics.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Routing failures and module debug requests arrive as messages, are kept as
//! [`LogEntry`] records and mirrored to `tracing`.

use core_types::{debug_port_id, PortId, CONFIG_FLOW, DIAGNOSTIC_FLOW};
use hub::Port;
use ipc::{Diagnostic, EventEmitter, Message, MessageBody, SharedConfig, Source};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use ipc::LogLevel;

/// Shared-config key holding the minimum recorded level
pub const LEVEL_KEY: &str = "debug";

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Originating port or the hub (if known)
    pub source: Option<Source>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: String) -> Self {
        Self {
            level,
            source: None,
            message,
            fields: Vec::new(),
        }
    }

    /// Sets the source
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: String, value: String) -> Self {
        self.fields.push((key, value));
        self
    }

    fn from_diagnostic(source: Source, diagnostic: Diagnostic) -> Self {
        Self {
            level: diagnostic.level,
            source: Some(source),
            message: diagnostic.text,
            fields: diagnostic.fields,
        }
    }
}

/// Where the debug port keeps its records
///
/// Clones share the same storage, so the host can read what the port wrote
/// after handing the port to the hub.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogSink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an entry
    pub fn push(&self, entry: LogEntry) {
        self.lock().push(entry);
    }

    /// Copy of every entry, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every entry
    pub fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.lock())
    }
}

/// The debug port
pub struct LoggerPort {
    id: PortId,
    events: EventEmitter<MessageBody>,
    sink: LogSink,
    min_level: LogLevel,
}

impl LoggerPort {
    /// Creates the port under the reserved `debug` id
    pub fn new(sink: LogSink) -> Self {
        Self {
            id: debug_port_id(),
            events: EventEmitter::new(),
            sink,
            min_level: LogLevel::Debug,
        }
    }

    /// Sets the minimum recorded level
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Minimum recorded level
    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Sink the port records into
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    fn apply_config(&mut self, config: &SharedConfig) {
        let level = config.get(LEVEL_KEY).and_then(|value| value.as_str());
        match level.map(|name| (name, LogLevel::parse(name))) {
            Some((_, Some(level))) => {
                self.min_level = level;
                tracing::debug!("debug port level set to {}", level);
            }
            Some((name, None)) => tracing::warn!("unknown debug level {:?} ignored", name),
            None => {}
        }
    }

    fn record(&self, entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        let source = entry
            .source
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown".to_string());
        match entry.level {
            LogLevel::Debug => tracing::debug!("[{}] {}", source, entry.message),
            LogLevel::Info => tracing::info!("[{}] {}", source, entry.message),
            LogLevel::Warn => tracing::warn!("[{}] {}", source, entry.message),
            LogLevel::Error => tracing::error!("[{}] {}", source, entry.message),
        }
        self.sink.push(entry);
    }
}

impl Port for LoggerPort {
    fn id(&self) -> &PortId {
        &self.id
    }

    fn on_message(&mut self, flow: &str, message: Message) {
        match message.body {
            MessageBody::Config(config) if flow == CONFIG_FLOW => self.apply_config(&config),
            MessageBody::Setup(handshake) => self.apply_config(&handshake.config),
            MessageBody::Diagnostic(diagnostic) => {
                self.record(LogEntry::from_diagnostic(message.source, diagnostic))
            }
            MessageBody::Data { event, payload } => {
                let entry = LogEntry::new(LogLevel::Info, payload.to_string())
                    .with_source(message.source)
                    .with_field("flow".to_string(), flow.to_string())
                    .with_field("event".to_string(), event);
                self.record(entry);
            }
            other => {
                if flow != DIAGNOSTIC_FLOW {
                    tracing::trace!("debug port ignored {} on {}", other.kind(), flow);
                }
            }
        }
    }

    fn events(&self) -> &EventEmitter<MessageBody> {
        &self.events
    }

    fn describe(&self) -> String {
        format!("[Port {} (debug console)]", self.id)
    }
}
