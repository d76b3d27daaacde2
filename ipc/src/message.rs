//! Message types delivered by the hub

use crate::typed::{ControlRequest, ControlResponse, SetupHandshake};
use core_types::PortId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Process-wide configuration installed by a config broadcast
///
/// Every port observes the same allocation, whether it was registered before
/// or after the broadcast.
pub type SharedConfig = Arc<Value>;

/// Unique identifier for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Msg({})", self.0)
    }
}

/// Origin of a delivered message
///
/// Set by the hub when it delivers. A port cannot choose its own source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// The hub or the control plane acting through it
    Hub,
    /// A registered port, identified by the route it was sent on
    Port(PortId),
}

impl Source {
    /// Returns the originating port, if any
    pub fn port(&self) -> Option<&PortId> {
        match self {
            Source::Hub => None,
            Source::Port(id) => Some(id),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Hub => f.write_str("hub"),
            Source::Port(id) => write!(f, "port:{}", id),
        }
    }
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl LogLevel {
    /// Parses a level name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" | "log" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Returns the canonical level name
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured diagnostic addressed to the debug port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub level: LogLevel,
    /// Human-readable text
    pub text: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl Diagnostic {
    /// Creates a diagnostic without fields
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

/// Body of a routed message
#[derive(Debug, Clone)]
pub enum MessageBody {
    /// Application data; the payload is opaque to the core
    Data { event: String, payload: Value },
    /// Control request from a port to the port manager
    Control(ControlRequest),
    /// Port manager's answer on a port's control flow
    ControlResponse(ControlResponse),
    /// Setup handshake completing a port's attachment
    Setup(SetupHandshake),
    /// Process-wide configuration broadcast
    Config(SharedConfig),
    /// Diagnostic for the debug port
    Diagnostic(Diagnostic),
}

impl MessageBody {
    /// Creates an application data body
    pub fn data(event: impl Into<String>, payload: Value) -> Self {
        MessageBody::Data {
            event: event.into(),
            payload,
        }
    }

    /// Short name of the variant, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Data { .. } => "data",
            MessageBody::Control(_) => "control",
            MessageBody::ControlResponse(_) => "control-response",
            MessageBody::Setup(_) => "setup",
            MessageBody::Config(_) => "config",
            MessageBody::Diagnostic(_) => "diagnostic",
        }
    }
}

/// A message as delivered to a port
#[derive(Debug, Clone)]
pub struct Message {
    /// Unique identifier for this message
    pub id: MessageId,
    /// Stamped origin
    pub source: Source,
    /// Message body
    pub body: MessageBody,
}

impl Message {
    /// Creates a new message
    pub fn new(source: Source, body: MessageBody) -> Self {
        Self {
            id: MessageId::new(),
            source,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_id_creation() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("log"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::parse(LogLevel::Error.as_str()), Some(LogLevel::Error));
    }

    #[test]
    fn test_source_port() {
        let id = PortId::new("echo");
        assert_eq!(Source::Port(id.clone()).port(), Some(&id));
        assert_eq!(Source::Hub.port(), None);
        assert_eq!(format!("{}", Source::Port(id)), "port:echo");
    }

    #[test]
    fn test_diagnostic_fields() {
        let diagnostic = Diagnostic::new(LogLevel::Warn, "dropped")
            .with_field("target", "ghost.default")
            .with_field("kind", "data");
        assert_eq!(diagnostic.fields.len(), 2);
        assert_eq!(diagnostic.fields[0].1, "ghost.default");
    }

    #[test]
    fn test_message_body_kind() {
        let body = MessageBody::data("message", json!("whoo!"));
        assert_eq!(body.kind(), "data");
        let body = MessageBody::Config(Arc::new(json!({})));
        assert_eq!(body.kind(), "config");
    }
}
