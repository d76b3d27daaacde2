//! # Core Types
//!
//! This crate defines the identities shared by every routing component.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: A port is addressed by a typed identity, never
//!   by position or by a bare string that could be confused with a payload.
//! - **Addresses are values**: A flow address is a plain `(port, flow)` pair that
//!   can be stored, compared and sent inside a handshake.
//! - **Reserved names are stable**: The well-known flow names and port ids are
//!   defined once, here.
//!
//! ## Key Types
//!
//! - [`PortId`]: Process-unique identity of a port attached to the hub
//! - [`FlowAddress`]: Hub-side delivery address of a named flow on a port

pub mod flows;
pub mod ids;

pub use flows::{
    CONFIG_FLOW, CONTROL_FLOW, DEFAULT_FLOW, DIAGNOSTIC_FLOW, debug_port_id, manager_port_id,
};
pub use ids::{FlowAddress, PortId};
