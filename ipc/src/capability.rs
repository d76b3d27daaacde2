//! Type-erased capability grants
//!
//! The port manager answers a capability request with a [`CapabilityHandle`].
//! The requester knows which interface it asked for and downcasts the handle to
//! it; nothing else about the grant is visible to the routing core.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An interface the port manager can grant to a port
pub trait Capability: Any + Send + Sync + fmt::Debug {
    /// Capability name as used in control requests
    fn name(&self) -> &str;

    /// Upcast used for downcasting the handle
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a granted capability
#[derive(Clone)]
pub struct CapabilityHandle(Arc<dyn Capability>);

impl CapabilityHandle {
    /// Wraps a capability in a handle
    pub fn new<C: Capability>(capability: C) -> Self {
        Self(Arc::new(capability))
    }

    /// Returns the capability name
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Returns the capability as a concrete type, if it is one
    pub fn downcast_ref<C: Capability>(&self) -> Option<&C> {
        self.0.as_any().downcast_ref::<C>()
    }
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityHandle({:?})", self.0)
    }
}
