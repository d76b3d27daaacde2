//! # Control Plane Contract Tests
//!
//! This crate provides "golden" tests for the shapes that cross a context
//! boundary, to ensure they don't drift accidentally over time.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Wire shapes are written out as JSON literals
//! - **Testability first**: Contract tests fail when interfaces change
//! - **Mechanism not policy**: Define what must be stable, not how to use it
//!
//! ## Structure
//!
//! Each surface has a module with contract tests that verify:
//! - Capability request fields
//! - Control request and refusal shapes
//! - The setup handshake
//! - Reserved flow names and port ids
//! - Channel identifiers

pub mod channels;
pub mod control;
pub mod handshake;

/// Common test helpers for contract validation
pub mod test_helpers {
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use serde_json::Value;
    use std::fmt::Debug;

    /// Serializes a value to JSON
    pub fn to_json<T: Serialize>(value: &T) -> Value {
        serde_json::to_value(value).expect("Failed to serialize value")
    }

    /// Verifies a value serializes to exactly `expected`
    pub fn verify_json_contract<T: Serialize>(value: &T, expected: &Value, what: &str) {
        let actual = to_json(value);
        assert_eq!(
            &actual, expected,
            "{} shape changed: expected {}, got {}",
            what, expected, actual
        );
    }

    /// Verifies a JSON literal written by a peer still decodes to `expected`
    pub fn verify_decodes<T>(json: Value, expected: &T, what: &str)
    where
        T: DeserializeOwned + PartialEq + Debug,
    {
        let decoded: T = serde_json::from_value(json.clone())
            .unwrap_or_else(|e| panic!("{} no longer decodes from {}: {}", what, json, e));
        assert_eq!(&decoded, expected, "{} decoded differently", what);
    }
}
