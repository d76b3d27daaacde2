//! # Port Manager
//!
//! This crate attaches ports to the hub and serves their control requests.
//!
//! ## Philosophy
//!
//! - **One control flow per port**: At setup every port gets a route from its
//!   `control` flow to a manager-side flow named after it. The manager knows
//!   who is asking because the hub stamps the source, not because the sender
//!   says so.
//! - **Capabilities by name**: A port asks for `core` and gets its own
//!   channel factory. Nothing is shared between ports unless a link or a
//!   channel connects them.
//! - **The manager is just another port**: Its inbox is registered with the
//!   hub like any module. Requests are handled between hub delivery rounds.

pub mod capabilities;
pub mod error;
mod inbox;
pub mod module;

pub use capabilities::{CapabilityKind, Grant};
pub use error::ManagerError;
pub use module::{ModuleHandle, ModulePort};

use core_provider::ChannelFactory;
use core_types::{manager_port_id, FlowAddress, PortId, CONFIG_FLOW, CONTROL_FLOW};
use hub::{Hub, HubError, Port};
use inbox::{ControlEnvelope, ManagerInbox};
use ipc::{
    CapabilityError, CapabilityRequest, ControlRequest, ControlResponse, Diagnostic, Message,
    MessageBody, SetupHandshake, Source, CORE_PROVIDER_TYPE,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{mpsc, Arc};

/// Owns the hub and every attached port's control state
pub struct PortManager {
    /// Id of the manager's inbox port
    id: PortId,
    hub: Hub,
    /// Port → manager-side flow receiving its control traffic
    flows: BTreeMap<PortId, FlowAddress>,
    /// Capabilities granted, per port
    grants: HashMap<PortId, Vec<Grant>>,
    /// Control traffic queued by the inbox
    inbox: mpsc::Receiver<ControlEnvelope>,
}

impl PortManager {
    /// Takes ownership of `hub` and registers the manager's inbox with it
    pub fn new(mut hub: Hub) -> Result<Self, ManagerError> {
        let id = manager_port_id();
        let (port, inbox) = ManagerInbox::new(id.clone());
        hub.register(Box::new(port)).map_err(|error| match error {
            HubError::DuplicateRegistration(id) => ManagerError::DuplicateRegistration(id),
            other => ManagerError::Hub(other),
        })?;
        tracing::info!("port manager attached as {}", id);

        Ok(Self {
            id,
            hub,
            flows: BTreeMap::new(),
            grants: HashMap::new(),
            inbox,
        })
    }

    /// Id of the manager's own port
    pub fn id(&self) -> &PortId {
        &self.id
    }

    /// The hub
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// The hub, mutably
    pub fn hub_mut(&mut self) -> &mut Hub {
        &mut self.hub
    }

    /// Attaches a port
    ///
    /// Registers it, routes its control flow to the manager and queues the
    /// setup handshake. Returns the manager-side control address.
    pub fn setup(&mut self, port: Box<dyn Port>) -> Result<FlowAddress, ManagerError> {
        let id = port.id().clone();
        if self.flows.contains_key(&id) || id == self.id {
            tracing::warn!("rejected setup of duplicate port {}", id);
            return Err(ManagerError::DuplicateRegistration(id));
        }
        self.hub.register(port).map_err(|error| match error {
            HubError::DuplicateRegistration(id) => ManagerError::DuplicateRegistration(id),
            other => ManagerError::Hub(other),
        })?;

        let channel = FlowAddress::new(self.id.clone(), id.as_str());
        self.hub.install(
            FlowAddress::new(id.clone(), CONTROL_FLOW),
            channel.clone(),
        );
        self.flows.insert(id.clone(), channel.clone());

        let config = self
            .hub
            .shared_config()
            .cloned()
            .unwrap_or_else(|| Arc::new(json!({})));
        self.hub.emit(
            FlowAddress::new(id.clone(), CONTROL_FLOW),
            MessageBody::Setup(SetupHandshake {
                channel: channel.clone(),
                config,
            }),
        );
        tracing::info!("port {} attached, control on {}", id, channel);
        Ok(channel)
    }

    /// Detaches a port
    ///
    /// Tears down its capabilities, closing every channel its factory made,
    /// and deregisters it. Returns whether anything was attached.
    pub fn teardown(&mut self, id: &PortId) -> bool {
        if *id == self.id {
            return false;
        }
        let attached = self.flows.remove(id).is_some();
        if let Some(grants) = self.grants.remove(id) {
            for grant in &grants {
                grant.teardown();
            }
        }
        let registered = self.hub.deregister(id);
        if attached || registered {
            tracing::info!("port {} detached", id);
        }
        attached || registered
    }

    /// Whether a port is attached through this manager
    pub fn is_attached(&self, id: &PortId) -> bool {
        self.flows.contains_key(id)
    }

    /// Attached ports, in id order
    pub fn ports(&self) -> Vec<PortId> {
        self.flows.keys().cloned().collect()
    }

    /// Manager-side control address of a port
    pub fn control_flow(&self, id: &PortId) -> Option<&FlowAddress> {
        self.flows.get(id)
    }

    /// The channel factory granted to a port, if any
    pub fn factory(&self, id: &PortId) -> Option<ChannelFactory> {
        self.grants.get(id)?.iter().find_map(|grant| match grant {
            Grant::Core(provider) => Some(provider.construct()),
        })
    }

    /// Installs the shared configuration and queues it to every port
    pub fn broadcast_config(&mut self, config: serde_json::Value) {
        let config = self.hub.broadcast_config(config);
        tracing::debug!("config broadcast on {}: {}", CONFIG_FLOW, config);
    }

    /// Delivers and handles control requests until nothing is left
    ///
    /// Returns the number of hub deliveries plus control requests handled.
    pub fn run_until_idle(&mut self) -> Result<usize, ManagerError> {
        let mut total = 0;
        loop {
            total += self.hub.run_until_idle()?;
            let handled = self.handle_control();
            total += handled;
            if handled == 0 && self.hub.is_idle() {
                return Ok(total);
            }
        }
    }

    /// Handles queued control traffic, returning how many messages were taken
    pub fn handle_control(&mut self) -> usize {
        let mut handled = 0;
        while let Ok((flow, message)) = self.inbox.try_recv() {
            handled += 1;
            self.handle_control_message(&flow, message);
        }
        handled
    }

    fn handle_control_message(&mut self, flow: &str, message: Message) {
        let port = PortId::new(flow);
        if !self.flows.contains_key(&port) {
            tracing::debug!("control message for detached port {} discarded", port);
            return;
        }
        if message.source.port() != Some(&port) {
            tracing::warn!(
                "control flow of {} received a message from {}, ignored",
                port,
                message.source
            );
            return;
        }
        let request = match message.body {
            MessageBody::Control(request) => request,
            other => {
                tracing::debug!("ignored {} on control flow of {}", other.kind(), port);
                return;
            }
        };

        match request {
            ControlRequest::Capability(request) => {
                let response = self.grant(&port, &request);
                self.reply(&port, response);
            }
            ControlRequest::Link { flow, to, to_flow } => {
                let response = self.link(&port, flow, to, to_flow);
                self.reply(&port, response);
            }
            ControlRequest::Debug { level, message } => {
                self.hub
                    .forward_diagnostic(Source::Port(port), Diagnostic::new(level, message));
            }
            ControlRequest::Close => {
                self.teardown(&port);
            }
        }
    }

    fn reply(&self, port: &PortId, response: ControlResponse) {
        self.hub.emit(
            FlowAddress::new(port.clone(), CONTROL_FLOW),
            MessageBody::ControlResponse(response),
        );
    }

    fn grant(&mut self, port: &PortId, request: &CapabilityRequest) -> ControlResponse {
        if request.provider != CORE_PROVIDER_TYPE {
            tracing::warn!("{} asked for unknown provider {}", port, request.provider);
            return ControlResponse::Error(CapabilityError::UnknownProvider(
                request.provider.clone(),
            ));
        }
        let kind = match CapabilityKind::lookup(&request.request) {
            Some(kind) => kind,
            None => {
                tracing::warn!("{} asked for unknown capability {}", port, request.request);
                return ControlResponse::Error(CapabilityError::NotFound(request.request.clone()));
            }
        };

        let grants = self.grants.entry(port.clone()).or_default();
        if grants.iter().any(|grant| grant.kind() == kind) {
            tracing::warn!("{} asked for {} twice", port, kind.name());
            return ControlResponse::Error(CapabilityError::AlreadyGranted(
                kind.name().to_string(),
            ));
        }

        let grant = Grant::construct(kind, port, &self.hub.handle());
        let handle = grant.handle();
        grants.push(grant);
        tracing::info!("granted {} to {}", kind.name(), port);
        ControlResponse::Capability(handle)
    }

    fn link(&mut self, port: &PortId, flow: String, to: PortId, to_flow: String) -> ControlResponse {
        if flow == CONTROL_FLOW || to_flow == CONTROL_FLOW {
            return ControlResponse::Error(CapabilityError::ReservedFlow(CONTROL_FLOW.to_string()));
        }
        if to == self.id || !self.hub.is_registered(&to) {
            return ControlResponse::Error(CapabilityError::UnknownPort(to));
        }

        let local = FlowAddress::new(port.clone(), flow.as_str());
        let remote = FlowAddress::new(to.clone(), to_flow);
        self.hub.install(local.clone(), remote.clone());
        self.hub.install(remote.clone(), local.clone());
        tracing::info!("linked {} <-> {}", local, remote);
        ControlResponse::Linked { flow, to }
    }
}
