//! Routing Test Utilities
//!
//! This crate provides shared utilities for end-to-end routing tests.
//!
//! ## Test Philosophy
//!
//! - **Whole stack**: Tests go through the port manager and the hub, the way
//!   a module would
//! - **Deterministic delivery**: Nothing is observed until the hub runs
//! - **No capability leaks**: Factories and channels die with their port

use core_provider::{ChannelFactory, Endpoint};
use core_types::{debug_port_id, PortId};
use hub::Hub;
use ipc::Emitter;
use port_manager::{ModuleHandle, ModulePort, PortManager};
use serde_json::Value;
use services_logger::{LogSink, LoggerPort};
use std::sync::{Arc, Mutex};

/// Shared record of payloads seen by a listener
pub type Received = Arc<Mutex<Vec<Value>>>;

/// Bootstrap helper for tests
///
/// Creates a port manager over a fresh hub with the debug port attached.
pub fn test_bootstrap() -> (PortManager, LogSink) {
    let sink = LogSink::new();
    let mut manager = PortManager::new(Hub::new()).expect("Failed to create manager");
    manager
        .setup(Box::new(LoggerPort::new(sink.clone())))
        .expect("Failed to attach debug port");
    manager
        .hub_mut()
        .attach_debug(debug_port_id())
        .expect("Failed to mark debug port");
    (manager, sink)
}

/// Attaches a module port and delivers its setup handshake
pub fn attach_module(manager: &mut PortManager, name: &str) -> ModuleHandle {
    let (port, mut handle) = ModulePort::new(PortId::new(name));
    manager.setup(Box::new(port)).expect("Failed to attach module");
    manager.run_until_idle().expect("Hub did not settle");
    handle.poll();
    handle
}

/// Requests `core` over the module's control flow and returns its factory
pub fn grant_core(manager: &mut PortManager, handle: &mut ModuleHandle) -> ChannelFactory {
    handle.request_core();
    manager.run_until_idle().expect("Hub did not settle");
    handle
        .take_core()
        .expect("No control response")
        .expect("Core capability refused")
}

/// Registers a listener that records every payload of `event`
pub fn record(endpoint: &Endpoint, event: &str) -> Received {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    endpoint.on(event, move |payload| sink.lock().unwrap().push(payload.clone()));
    received
}
