//! Typed control-plane messages.
//!
//! This module provides the schema a port uses to talk to the port manager
//! over its control flow, and the handshake the manager sends back when the
//! port is attached.

use crate::capability::CapabilityHandle;
use crate::message::{LogLevel, SharedConfig};
use core_types::{FlowAddress, PortId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider type carried by capability requests.
pub const CORE_PROVIDER_TYPE: &str = "Core Provider";

/// Capability name of the channel factory.
pub const CORE_CAPABILITY: &str = "core";

/// Request for a named capability.
///
/// Serializes as `{ "type": "Core Provider", "request": "core" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityRequest {
    /// Provider type
    #[serde(rename = "type")]
    pub provider: String,
    /// Capability name
    pub request: String,
}

impl CapabilityRequest {
    /// Creates a request for a capability by name.
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            provider: CORE_PROVIDER_TYPE.to_string(),
            request: request.into(),
        }
    }

    /// Creates a request for the channel factory.
    pub fn core() -> Self {
        Self::new(CORE_CAPABILITY)
    }
}

/// Requests a port may send on its control flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlRequest {
    /// Ask for a capability by name
    Capability(CapabilityRequest),
    /// Connect one of this port's flows to a flow on another port, both ways
    Link {
        flow: String,
        to: PortId,
        to_flow: String,
    },
    /// Forward a log line to the debug port
    Debug { level: LogLevel, message: String },
    /// Detach this port
    Close,
}

/// Capability negotiation failures, answered on the requester's control flow.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityError {
    /// No capability is registered under this name
    #[error("Capability not found: {0}")]
    NotFound(String),

    /// The request named a provider type the manager does not serve
    #[error("Unknown provider type: {0}")]
    UnknownProvider(String),

    /// The capability was already granted to this port
    #[error("Capability already granted: {0}")]
    AlreadyGranted(String),

    /// A link named a port that is not attached
    #[error("Unknown port: {0}")]
    UnknownPort(PortId),

    /// A link tried to take over a flow reserved for the control plane
    #[error("Flow is reserved: {0}")]
    ReservedFlow(String),
}

/// Port manager's answer to a control request.
#[derive(Debug, Clone)]
pub enum ControlResponse {
    /// Capability granted
    Capability(CapabilityHandle),
    /// Flow linked to another port
    Linked { flow: String, to: PortId },
    /// Request refused
    Error(CapabilityError),
}

/// Handshake sent to a port once it is attached.
///
/// `channel` is the manager-side address that receives this port's control
/// traffic; `config` is the process-wide configuration at setup time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetupHandshake {
    /// Control flow address allocated to the port
    pub channel: FlowAddress,
    /// Current shared configuration
    pub config: SharedConfig,
}
