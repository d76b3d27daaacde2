//! Channel error types

use core_types::PortId;
use ipc::ChannelIdentifier;
use thiserror::Error;

/// Failures of channel creation and binding
///
/// Returned to the caller of `create_channel` / `bind_channel`; the factory
/// and its other channels are unaffected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The identifier was never allocated by this factory
    #[error("No such pending channel: {0}")]
    UnknownChannel(ChannelIdentifier),

    /// The channel was already bound by a peer
    #[error("Channel already bound: {0}")]
    AlreadyBound(ChannelIdentifier),

    /// The channel was closed before it could be bound
    #[error("Channel closed: {0}")]
    Closed(ChannelIdentifier),

    /// The owning port was torn down
    #[error("Channel factory of port {0} has been torn down")]
    FactoryTornDown(PortId),
}
