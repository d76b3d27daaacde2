//! Identities for ports and flows

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a port
///
/// Ports are the components attached to the hub. The identity is a string so
/// that modules can pick meaningful names; [`PortId::generate`] mints a random
/// one when the owner has no name to offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(String);

impl PortId {
    /// Creates a port ID from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a new random port ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the port ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PortId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Delivery address of a named flow on a port
///
/// The hub routes from one flow address to another. The port manager hands a
/// flow address to each module during setup so the module knows where its
/// control traffic lands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowAddress {
    /// Port that owns the flow
    pub port: PortId,
    /// Flow name on that port
    pub flow: String,
}

impl FlowAddress {
    /// Creates a new flow address
    pub fn new(port: impl Into<PortId>, flow: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            flow: flow.into(),
        }
    }
}

impl fmt::Display for FlowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.port, self.flow)
    }
}
