//! Stable flow names and port ids for the routing core.

use crate::PortId;

/// Flow carrying control requests between a port and the port manager.
pub const CONTROL_FLOW: &str = "control";

/// Flow on which the process-wide configuration is delivered.
pub const CONFIG_FLOW: &str = "config";

/// Flow on which the debug port receives diagnostics.
pub const DIAGNOSTIC_FLOW: &str = "diagnostic";

/// Flow for application data when a module names none.
pub const DEFAULT_FLOW: &str = "default";

const MANAGER_PORT_ID: &str = "manager";
const DEBUG_PORT_ID: &str = "debug";

/// Stable port ID of the port manager's control inbox.
pub fn manager_port_id() -> PortId {
    PortId::new(MANAGER_PORT_ID)
}

/// Stable port ID of the debug port.
pub fn debug_port_id() -> PortId {
    PortId::new(DEBUG_PORT_ID)
}
