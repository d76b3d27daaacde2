//! Setup handshake and addressing contract tests

use crate::test_helpers::*;
use core_types::{FlowAddress, PortId};
use ipc::SetupHandshake;
use serde_json::json;
use std::sync::Arc;

// ===== Reserved Names =====
const CONTROL: &str = "control";
const CONFIG: &str = "config";
const DIAGNOSTIC: &str = "diagnostic";
const DEFAULT: &str = "default";
const MANAGER: &str = "manager";
const DEBUG: &str = "debug";

/// The handshake a port named `port` receives with an empty configuration
pub fn canonical_handshake(port: &str) -> SetupHandshake {
    SetupHandshake {
        channel: FlowAddress::new(PortId::new(MANAGER), port),
        config: Arc::new(json!({})),
    }
}

// ===== Contract Tests =====
