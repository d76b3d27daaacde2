//! # Host Runtime
//!
//! Boots the hub, the debug port and the port manager, then plays a script.

use crate::route_script::{RouteScript, ScriptCommand};
use core_provider::{ChannelError, ChannelFactory, CoreProvider, Endpoint};
use core_types::{debug_port_id, PortId};
use hub::{Hub, HubConfig, HubStats, DEFAULT_STEP_LIMIT};
use ipc::{CapabilityError, ChannelIdentifier, ChannelSide, ControlResponse, Emitter};
use port_manager::{ManagerError, ModuleHandle, ModulePort, PortManager};
use serde_json::Value;
use services_logger::{LogEntry, LogSink, LoggerPort};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostRuntimeError {
    #[error("Manager error: {0}")]
    ManagerError(#[from] ManagerError),

    #[error("Channel error: {0}")]
    ChannelError(#[from] ChannelError),

    #[error("Script error: {0}")]
    ScriptError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Port not attached: {0}")]
    UnknownPort(PortId),

    #[error("Port {0} has no channel factory")]
    NoFactory(PortId),

    #[error("Port {port} holds no {side} endpoint of {channel}")]
    UnknownEndpoint {
        port: PortId,
        channel: ChannelIdentifier,
        side: ChannelSide,
    },
}

/// Host runtime configuration
#[derive(Debug, Clone)]
pub struct HostRuntimeConfig {
    /// Optional route script text
    pub script: Option<String>,
    /// Optional JSON file holding the shared configuration
    pub config_path: Option<PathBuf>,
    /// Deliveries allowed per scheduling round
    pub step_limit: usize,
    /// Fallback `tracing` filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for HostRuntimeConfig {
    fn default() -> Self {
        Self {
            script: None,
            config_path: None,
            step_limit: DEFAULT_STEP_LIMIT,
            log_level: "info".to_string(),
        }
    }
}

/// A payload observed by a scripted channel listener
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub port: PortId,
    pub channel: ChannelIdentifier,
    pub side: ChannelSide,
    pub event: String,
    pub payload: Value,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct HostReport {
    /// Payloads seen by listeners, in delivery order
    pub received: Vec<ReceivedMessage>,
    /// Capability and link refusals, in order
    pub refusals: Vec<(PortId, CapabilityError)>,
    /// Debug port records
    pub log: Vec<LogEntry>,
    /// Hub delivery counters
    pub stats: HubStats,
    /// Ports still attached at the end
    pub ports: Vec<PortId>,
}

type EndpointKey = (PortId, ChannelIdentifier, ChannelSide);

/// Host runtime
pub struct HostRuntime {
    /// Port manager, owning the hub
    manager: PortManager,
    /// Debug port records
    sink: LogSink,
    /// Route script
    script: Option<RouteScript>,
    /// Module-side handles of attached ports
    modules: BTreeMap<PortId, ModuleHandle>,
    /// Factories granted to modules
    factories: HashMap<PortId, ChannelFactory>,
    /// Channel endpoints held by modules
    endpoints: HashMap<EndpointKey, Endpoint>,
    received: Arc<Mutex<Vec<ReceivedMessage>>>,
    refusals: Vec<(PortId, CapabilityError)>,
}

impl HostRuntime {
    /// Creates a new host runtime
    pub fn new(config: HostRuntimeConfig) -> Result<Self, HostRuntimeError> {
        let hub = Hub::with_config(HubConfig::default().with_step_limit(config.step_limit));
        let mut manager = PortManager::new(hub)?;

        if let Some(path) = &config.config_path {
            let text = fs::read_to_string(path).map_err(|e| {
                HostRuntimeError::ConfigError(format!("{}: {}", path.display(), e))
            })?;
            let shared: Value = serde_json::from_str(&text).map_err(|e| {
                HostRuntimeError::ConfigError(format!("{}: {}", path.display(), e))
            })?;
            manager.broadcast_config(shared);
        }

        let sink = LogSink::new();
        manager.setup(Box::new(LoggerPort::new(sink.clone())))?;
        manager
            .hub_mut()
            .attach_debug(debug_port_id())
            .map_err(ManagerError::from)?;

        let script = match &config.script {
            Some(text) => Some(
                RouteScript::from_text(text)
                    .map_err(|e| HostRuntimeError::ScriptError(e.to_string()))?,
            ),
            None => None,
        };

        tracing::info!("host runtime ready, {} ports", manager.hub().port_count());
        Ok(Self {
            manager,
            sink,
            script,
            modules: BTreeMap::new(),
            factories: HashMap::new(),
            endpoints: HashMap::new(),
            received: Arc::new(Mutex::new(Vec::new())),
            refusals: Vec::new(),
        })
    }

    /// Returns the port manager
    pub fn manager(&self) -> &PortManager {
        &self.manager
    }

    /// Returns the port manager mutably
    pub fn manager_mut(&mut self) -> &mut PortManager {
        &mut self.manager
    }

    /// Returns the debug port's sink
    pub fn log(&self) -> &LogSink {
        &self.sink
    }

    /// Plays the script to the end, then delivers everything queued
    pub fn run(&mut self) -> Result<HostReport, HostRuntimeError> {
        while let Some(command) = self.script.as_mut().and_then(RouteScript::next_command) {
            self.execute(command)?;
        }
        self.manager.run_until_idle()?;
        Ok(self.report())
    }

    /// Executes one command
    pub fn execute(&mut self, command: ScriptCommand) -> Result<(), HostRuntimeError> {
        tracing::debug!("executing {:?}", command);
        match command {
            ScriptCommand::Attach(id) => {
                let (port, handle) = ModulePort::new(id.clone());
                self.manager.setup(Box::new(port))?;
                self.modules.insert(id, handle);
            }
            ScriptCommand::Detach(id) => {
                self.manager.teardown(&id);
                self.modules.remove(&id);
                self.factories.remove(&id);
                self.endpoints.retain(|(port, _, _), _| *port != id);
            }
            ScriptCommand::Config(value) => self.manager.broadcast_config(value),
            ScriptCommand::Core(id) => {
                self.module(&id)?.request_core();
                self.settle(&id)?;
            }
            ScriptCommand::Request { port, name } => {
                self.module(&port)?.request_capability(name);
                self.settle(&port)?;
            }
            ScriptCommand::Link {
                port,
                flow,
                to,
                to_flow,
            } => {
                self.module(&port)?.link(flow, to, to_flow);
                self.settle(&port)?;
            }
            ScriptCommand::Create(port) => {
                let (channel, input) = self.factory(&port)?.create_channel()?;
                tracing::info!("{} created {}", port, channel);
                self.endpoints
                    .insert((port, channel, ChannelSide::Input), input);
            }
            ScriptCommand::Bind { port, channel } => {
                let output = self.factory(&port)?.bind_channel(channel)?;
                self.endpoints
                    .insert((port, channel, ChannelSide::Output), output);
            }
            ScriptCommand::Listen {
                port,
                channel,
                side,
                event,
            } => {
                let received = Arc::clone(&self.received);
                let record = ReceivedMessage {
                    port: port.clone(),
                    channel,
                    side,
                    event: event.clone(),
                    payload: Value::Null,
                };
                self.endpoint(&port, channel, side)?
                    .on(&event, move |payload| {
                        let mut record = record.clone();
                        record.payload = payload.clone();
                        received
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(record);
                    });
            }
            ScriptCommand::Send {
                port,
                channel,
                side,
                event,
                payload,
            } => {
                self.endpoint(&port, channel, side)?.emit(&event, payload);
            }
            ScriptCommand::Close { port, channel } => {
                let endpoint = self
                    .endpoint(&port, channel, ChannelSide::Input)
                    .or_else(|_| self.endpoint(&port, channel, ChannelSide::Output))?;
                endpoint.close();
            }
            ScriptCommand::Debug { port, level, text } => {
                self.module(&port)?.log(level, text);
            }
            ScriptCommand::Run => {
                self.manager.run_until_idle()?;
            }
        }
        Ok(())
    }

    fn module(&self, id: &PortId) -> Result<&ModuleHandle, HostRuntimeError> {
        self.modules
            .get(id)
            .ok_or_else(|| HostRuntimeError::UnknownPort(id.clone()))
    }

    fn factory(&self, id: &PortId) -> Result<&ChannelFactory, HostRuntimeError> {
        self.factories
            .get(id)
            .ok_or_else(|| HostRuntimeError::NoFactory(id.clone()))
    }

    fn endpoint(
        &self,
        port: &PortId,
        channel: ChannelIdentifier,
        side: ChannelSide,
    ) -> Result<&Endpoint, HostRuntimeError> {
        self.endpoints
            .get(&(port.clone(), channel, side))
            .ok_or_else(|| HostRuntimeError::UnknownEndpoint {
                port: port.clone(),
                channel,
                side,
            })
    }

    /// Delivers the control exchange and collects `id`'s responses
    fn settle(&mut self, id: &PortId) -> Result<(), HostRuntimeError> {
        self.manager.run_until_idle()?;
        let handle = self
            .modules
            .get_mut(id)
            .ok_or_else(|| HostRuntimeError::UnknownPort(id.clone()))?;

        while let Some(response) = handle.next_response() {
            match response {
                ControlResponse::Capability(capability) => {
                    match CoreProvider::from_handle(&capability) {
                        Some(provider) => {
                            tracing::info!("{} received {}", id, capability.name());
                            self.factories.insert(id.clone(), provider.construct());
                        }
                        None => tracing::warn!("{} received unusable {}", id, capability.name()),
                    }
                }
                ControlResponse::Linked { flow, to } => {
                    tracing::info!("{} linked {} to {}", id, flow, to);
                }
                ControlResponse::Error(error) => {
                    tracing::warn!("{} refused: {}", id, error);
                    self.refusals.push((id.clone(), error));
                }
            }
        }
        Ok(())
    }

    fn report(&self) -> HostReport {
        HostReport {
            received: self
                .received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            refusals: self.refusals.clone(),
            log: self.sink.entries(),
            stats: self.manager.hub().stats(),
            ports: self.manager.ports(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runtime(script: &str) -> HostRuntime {
        HostRuntime::new(HostRuntimeConfig {
            script: Some(script.to_string()),
            ..HostRuntimeConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = HostRuntimeConfig::default();
        assert!(config.script.is_none());
        assert!(config.config_path.is_none());
        assert_eq!(config.step_limit, DEFAULT_STEP_LIMIT);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_boot_attaches_debug_port() {
        let runtime = HostRuntime::new(HostRuntimeConfig::default()).unwrap();
        assert!(runtime.manager().is_attached(&debug_port_id()));
    }

    #[test]
    fn test_channel_round_trip() {
        let report = runtime(
            r#"
            attach alice
            core alice
            create alice
            listen alice 0 input message
            bind alice 0
            send alice 0 output message "whoo!"
            "#,
        )
        .run()
        .unwrap();

        assert_eq!(report.received.len(), 1);
        assert_eq!(report.received[0].payload, json!("whoo!"));
        assert_eq!(report.received[0].side, ChannelSide::Input);
    }

    #[test]
    fn test_create_without_core_fails() {
        let result = runtime("attach alice\ncreate alice").run();
        assert!(matches!(result, Err(HostRuntimeError::NoFactory(_))));
    }

    #[test]
    fn test_unknown_capability_is_reported() {
        let report = runtime("attach alice\nrequest alice storage").run().unwrap();
        assert_eq!(
            report.refusals,
            vec![(
                PortId::new("alice"),
                CapabilityError::NotFound("storage".to_string())
            )]
        );
    }

    #[test]
    fn test_debug_lines_reach_log() {
        let report = runtime("attach alice\ndebug alice warn low disk").run().unwrap();
        let entry = report
            .log
            .iter()
            .find(|entry| entry.message == "low disk")
            .unwrap();
        assert_eq!(entry.level, ipc::LogLevel::Warn);
    }

    #[test]
    fn test_detach_drops_endpoints() {
        let mut runtime = runtime("attach alice\ncore alice\ncreate alice\ndetach alice");
        let report = runtime.run().unwrap();
        assert!(!report.ports.contains(&PortId::new("alice")));
        assert!(matches!(
            runtime.execute(ScriptCommand::Send {
                port: PortId::new("alice"),
                channel: ChannelIdentifier::new(0),
                side: ChannelSide::Input,
                event: "message".to_string(),
                payload: json!(1),
            }),
            Err(HostRuntimeError::UnknownEndpoint { .. })
        ));
    }
}
