//! Capabilities the port manager can grant, by name.

use core_provider::CoreProvider;
use core_types::PortId;
use hub::HubHandle;
use ipc::{CapabilityHandle, CORE_CAPABILITY};

/// Known capability requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// Dynamic channel pairing
    Core,
}

/// Name → capability table consulted for every capability request.
const CAPABILITY_TABLE: &[(&str, CapabilityKind)] = &[(CORE_CAPABILITY, CapabilityKind::Core)];

impl CapabilityKind {
    /// Looks a capability up by request name
    pub fn lookup(name: &str) -> Option<Self> {
        CAPABILITY_TABLE
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, kind)| *kind)
    }

    /// Request name of the capability
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityKind::Core => CORE_CAPABILITY,
        }
    }
}

/// A capability instantiated for one port
#[derive(Debug, Clone)]
pub enum Grant {
    /// Channel factory
    Core(CoreProvider),
}

impl Grant {
    /// Builds a fresh capability of `kind` bound to `owner`
    pub fn construct(kind: CapabilityKind, owner: &PortId, scheduler: &HubHandle) -> Self {
        match kind {
            CapabilityKind::Core => Grant::Core(CoreProvider::new(owner.clone(), scheduler.clone())),
        }
    }

    /// Kind of the grant
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Grant::Core(_) => CapabilityKind::Core,
        }
    }

    /// Handle sent to the requesting port
    pub fn handle(&self) -> CapabilityHandle {
        match self {
            Grant::Core(provider) => CapabilityHandle::new(provider.clone()),
        }
    }

    /// Releases everything the capability allocated
    pub fn teardown(&self) {
        match self {
            Grant::Core(provider) => {
                provider.construct().teardown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub::Hub;

    #[test]
    fn test_lookup() {
        assert_eq!(CapabilityKind::lookup("core"), Some(CapabilityKind::Core));
        assert_eq!(CapabilityKind::lookup("storage"), None);
        assert_eq!(CapabilityKind::Core.name(), "core");
    }

    #[test]
    fn test_grants_are_per_port() {
        let hub = Hub::new();
        let alice = Grant::construct(CapabilityKind::Core, &PortId::new("alice"), &hub.handle());
        let bob = Grant::construct(CapabilityKind::Core, &PortId::new("bob"), &hub.handle());

        let alice_factory = CoreProvider::from_handle(&alice.handle()).unwrap().construct();
        let bob_factory = CoreProvider::from_handle(&bob.handle()).unwrap().construct();
        let (identifier, _input) = alice_factory.create_channel().unwrap();
        assert!(bob_factory.bind_channel(identifier).is_err());
    }

    #[test]
    fn test_teardown_closes_factory() {
        let hub = Hub::new();
        let grant = Grant::construct(CapabilityKind::Core, &PortId::new("alice"), &hub.handle());
        let factory = CoreProvider::from_handle(&grant.handle()).unwrap().construct();
        let (_identifier, _input) = factory.create_channel().unwrap();

        grant.teardown();
        assert!(factory.is_torn_down());
        assert_eq!(grant.kind(), CapabilityKind::Core);
    }
}
