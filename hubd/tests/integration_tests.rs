//! Integration tests for the hubd host runtime

use hubd::{HostRuntime, HostRuntimeConfig, HostRuntimeError};
use ipc::{CapabilityError, ChannelSide, LogLevel};
use serde_json::json;
use std::io::Write;

const PAIRING_SCRIPT: &str = include_str!("../../demos/pairing.hub");

#[test]
fn test_pairing_demo_script() {
    let config = HostRuntimeConfig {
        script: Some(PAIRING_SCRIPT.to_string()),
        ..HostRuntimeConfig::default()
    };

    let report = HostRuntime::new(config).unwrap().run().unwrap();

    let payloads: Vec<_> = report
        .received
        .iter()
        .map(|message| (message.side, message.payload.clone()))
        .collect();
    assert_eq!(
        payloads,
        vec![
            (ChannelSide::Output, json!("queued before bind")),
            (ChannelSide::Input, json!("whoo!")),
        ]
    );
    assert_eq!(report.refusals.len(), 1);
    assert!(matches!(
        &report.refusals[0].1,
        CapabilityError::NotFound(name) if name == "storage"
    ));
    assert!(report
        .log
        .iter()
        .any(|entry| entry.level == LogLevel::Warn && entry.message == "running low on patience"));
}

#[test]
fn test_config_file_sets_debug_level() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", json!({"debug": "error"})).unwrap();

    let config = HostRuntimeConfig {
        script: Some("attach alice\ndebug alice warn filtered\ndebug alice error kept".to_string()),
        config_path: Some(file.path().to_path_buf()),
        ..HostRuntimeConfig::default()
    };
    let report = HostRuntime::new(config).unwrap().run().unwrap();

    let messages: Vec<_> = report.log.iter().map(|entry| entry.message.as_str()).collect();
    assert_eq!(messages, vec!["kept"]);
}

#[test]
fn test_invalid_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();

    let config = HostRuntimeConfig {
        config_path: Some(file.path().to_path_buf()),
        ..HostRuntimeConfig::default()
    };
    assert!(matches!(
        HostRuntime::new(config),
        Err(HostRuntimeError::ConfigError(_))
    ));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = HostRuntimeConfig {
        config_path: Some(dir.path().join("absent.json")),
        ..HostRuntimeConfig::default()
    };
    assert!(matches!(
        HostRuntime::new(config),
        Err(HostRuntimeError::ConfigError(_))
    ));
}

#[test]
fn test_invalid_script() {
    let config = HostRuntimeConfig {
        script: Some("spawn alice".to_string()),
        ..HostRuntimeConfig::default()
    };
    assert!(matches!(
        HostRuntime::new(config),
        Err(HostRuntimeError::ScriptError(_))
    ));
}

#[test]
fn test_double_bind_fails_run() {
    let config = HostRuntimeConfig {
        script: Some("attach alice\ncore alice\ncreate alice\nbind alice 0\nbind alice 0".to_string()),
        ..HostRuntimeConfig::default()
    };
    let result = HostRuntime::new(config).unwrap().run();
    assert!(matches!(result, Err(HostRuntimeError::ChannelError(_))));
}

#[test]
fn test_duplicate_attach_fails_run() {
    let config = HostRuntimeConfig {
        script: Some("attach alice\nattach alice".to_string()),
        ..HostRuntimeConfig::default()
    };
    let result = HostRuntime::new(config).unwrap().run();
    assert!(matches!(result, Err(HostRuntimeError::ManagerError(_))));
}

#[test]
fn test_step_limit_guards_runaway_runs() {
    let config = HostRuntimeConfig {
        script: Some(
            "attach alice\nattach bob\nlink alice default bob default\nrun".to_string(),
        ),
        step_limit: 1,
        ..HostRuntimeConfig::default()
    };
    let result = HostRuntime::new(config).unwrap().run();
    assert!(matches!(result, Err(HostRuntimeError::ManagerError(_))));
}
