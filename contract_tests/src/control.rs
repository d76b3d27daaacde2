//! Control flow contract tests
//!
//! These tests define the stable contract between a port and the port
//! manager.

use crate::test_helpers::*;
use ipc::{CapabilityError, CapabilityRequest, ControlRequest, LogLevel};
use serde_json::json;

// ===== Provider Identifiers =====
const PROVIDER_TYPE: &str = "Core Provider";
const CORE_REQUEST: &str = "core";

/// The capability request every module sends for the channel factory
pub fn canonical_core_request() -> serde_json::Value {
    json!({"type": PROVIDER_TYPE, "request": CORE_REQUEST})
}

// ===== Contract Tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PortId;

    #[test]
    fn test_core_request_contract() {
        verify_json_contract(
            &CapabilityRequest::core(),
            &canonical_core_request(),
            "Core capability request",
        );
        verify_decodes(
            canonical_core_request(),
            &CapabilityRequest::core(),
            "Core capability request",
        );
    }

    #[test]
    fn test_provider_constants_stable() {
        assert_eq!(ipc::CORE_PROVIDER_TYPE, PROVIDER_TYPE);
        assert_eq!(ipc::CORE_CAPABILITY, CORE_REQUEST);
    }

    #[test]
    fn test_capability_control_request_contract() {
        verify_json_contract(
            &ControlRequest::Capability(CapabilityRequest::core()),
            &json!({"capability": canonical_core_request()}),
            "Capability control request",
        );
    }

    #[test]
    fn test_link_request_contract() {
        let request = ControlRequest::Link {
            flow: "default".to_string(),
            to: PortId::new("bob"),
            to_flow: "inbox".to_string(),
        };
        verify_json_contract(
            &request,
            &json!({"link": {"flow": "default", "to": "bob", "to_flow": "inbox"}}),
            "Link request",
        );
    }

    #[test]
    fn test_debug_request_contract() {
        let request = ControlRequest::Debug {
            level: LogLevel::Warn,
            message: "low disk".to_string(),
        };
        verify_json_contract(
            &request,
            &json!({"debug": {"level": "warn", "message": "low disk"}}),
            "Debug request",
        );
    }

    #[test]
    fn test_close_request_contract() {
        verify_json_contract(&ControlRequest::Close, &json!("close"), "Close request");
        verify_decodes(json!("close"), &ControlRequest::Close, "Close request");
    }

    #[test]
    fn test_refusal_contract() {
        verify_json_contract(
            &CapabilityError::NotFound("storage".to_string()),
            &json!({"NotFound": "storage"}),
            "Unknown capability refusal",
        );
        verify_json_contract(
            &CapabilityError::UnknownPort(PortId::new("ghost")),
            &json!({"UnknownPort": "ghost"}),
            "Unknown port refusal",
        );
    }
}
