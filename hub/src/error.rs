//! Hub error types

use core_types::{FlowAddress, PortId};
use thiserror::Error;

/// Errors returned to callers of the hub's management API
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// A port with this id is already registered; the existing one is kept
    #[error("Port already registered: {0}")]
    DuplicateRegistration(PortId),

    /// The operation named a port that is not registered
    #[error("Port not registered: {0}")]
    UnknownPort(PortId),

    /// `run_until_idle` delivered this many items and the queue is still busy
    #[error("Delivery step limit of {0} exceeded")]
    StepLimitExceeded(usize),
}

/// Reasons a message was dropped during routing
///
/// These never reach the sender. They are logged and forwarded to the debug
/// port as diagnostics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// Direct delivery to a flow on a port that is not registered
    #[error("No such target: {0}")]
    NoSuchTarget(FlowAddress),

    /// A port emitted on a flow with no installed route
    #[error("No route from {0}")]
    NoRoute(FlowAddress),
}
