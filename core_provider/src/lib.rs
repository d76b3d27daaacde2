//! # Core Provider
//!
//! This crate implements the `core` capability: dynamic channel pairing.
//!
//! ## Philosophy
//!
//! - **Rendezvous on an opaque identifier**: Two parties that share no route
//!   can still connect. One creates a channel and passes its identifier along;
//!   the other binds it.
//! - **Exactly-once binding**: A channel is `Pending` until bound, `Connected`
//!   after, `Closed` forever once released. Only the first bind succeeds.
//! - **No lost wake-ups**: Sends made before the peer binds are buffered and
//!   delivered in order once it does; listeners registered before the bind see
//!   everything sent after it.
//! - **Per-port factories**: Each port receives its own factory. Identifiers
//!   minted by one factory mean nothing to another.
//!
//! ## Example
//!
//! ```
//! use core_provider::ChannelFactory;
//! use core_types::PortId;
//! use hub::Hub;
//! use ipc::Emitter;
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! let mut hub = Hub::new();
//! let factory = ChannelFactory::new(PortId::new("alice"), hub.handle());
//!
//! let (identifier, input) = factory.create_channel().unwrap();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! input.on("message", move |payload| sink.lock().unwrap().push(payload.clone()));
//!
//! let output = factory.bind_channel(identifier).unwrap();
//! output.emit("message", json!("whoo!"));
//! hub.run_until_idle().unwrap();
//!
//! assert_eq!(*seen.lock().unwrap(), vec![json!("whoo!")]);
//! ```

pub mod channel;
pub mod error;
pub mod factory;

pub use channel::{ChannelState, Endpoint};
pub use error::ChannelError;
pub use factory::ChannelFactory;

use core_types::PortId;
use hub::HubHandle;
use ipc::{Capability, CapabilityHandle, CORE_CAPABILITY};
use std::any::Any;

/// The `core` capability granted to one port
///
/// The port manager hands this out wrapped in a [`CapabilityHandle`]. The
/// module downcasts it and calls [`CoreProvider::construct`] to obtain its
/// channel factory.
#[derive(Debug, Clone)]
pub struct CoreProvider {
    factory: ChannelFactory,
}

impl CoreProvider {
    /// Creates the capability for `owner`, with a fresh factory
    pub fn new(owner: PortId, scheduler: HubHandle) -> Self {
        Self {
            factory: ChannelFactory::new(owner, scheduler),
        }
    }

    /// Wraps an existing factory
    pub fn from_factory(factory: ChannelFactory) -> Self {
        Self { factory }
    }

    /// Returns the granted capability, if the handle carries one
    pub fn from_handle(handle: &CapabilityHandle) -> Option<&CoreProvider> {
        handle.downcast_ref::<CoreProvider>()
    }

    /// Port the capability was granted to
    pub fn owner(&self) -> &PortId {
        self.factory.owner()
    }

    /// Instantiates the channel factory
    ///
    /// Every instance shares the port's channel table.
    pub fn construct(&self) -> ChannelFactory {
        self.factory.clone()
    }
}

impl Capability for CoreProvider {
    fn name(&self) -> &str {
        CORE_CAPABILITY
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub::Hub;

    #[test]
    fn test_handle_round_trip() {
        let hub = Hub::new();
        let provider = CoreProvider::new(PortId::new("alice"), hub.handle());
        let handle = CapabilityHandle::new(provider);

        assert_eq!(handle.name(), CORE_CAPABILITY);
        let provider = CoreProvider::from_handle(&handle).unwrap();
        assert_eq!(provider.owner(), &PortId::new("alice"));
    }

    #[test]
    fn test_constructed_factories_share_channels() {
        let hub = Hub::new();
        let provider = CoreProvider::new(PortId::new("alice"), hub.handle());

        let first = provider.construct();
        let second = provider.construct();
        let (identifier, _input) = first.create_channel().unwrap();
        assert!(second.bind_channel(identifier).is_ok());
    }
}
