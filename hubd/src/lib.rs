//! # Hub Host Runtime
//!
//! This crate provides a host process for the hub.
//!
//! ## Philosophy
//!
//! - **Host owns I/O**: Ports never print; the debug port records
//! - **Scripts, not shells**: Topology changes come from a line-based script
//! - **Deterministic mode is first-class**: Every run ends in a report tests
//!   can assert on
//!
//! ## Responsibilities
//!
//! The host runtime:
//! - Boots a hub, the debug port and a port manager
//! - Loads the shared configuration from a JSON file
//! - Attaches module ports and drives them from a [`RouteScript`]
//! - Collects channel traffic and log entries into a [`HostReport`]
//!
//! ## Non-Responsibilities
//!
//! The host does NOT:
//! - Spawn or isolate execution contexts
//! - Resolve module manifests or URLs
//! - Talk to remote servers

pub mod route_script;
pub mod runtime;

pub use route_script::{RouteScript, RouteScriptError, ScriptCommand};
pub use runtime::{HostReport, HostRuntime, HostRuntimeConfig, HostRuntimeError, ReceivedMessage};
