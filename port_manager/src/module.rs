//! Generic application port
//!
//! A [`ModulePort`] is what gets attached to the hub; the matching
//! [`ModuleHandle`] stays with the module and is how it sends, asks for
//! capabilities and reads what arrived.

use core_provider::{ChannelFactory, CoreProvider};
use core_types::{FlowAddress, PortId, CONTROL_FLOW};
use hub::Port;
use ipc::{
    CapabilityError, CapabilityRequest, ControlRequest, ControlResponse, EventEmitter, LogLevel,
    Message, MessageBody, SharedConfig,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::mpsc;

/// The hub-side half of a module
pub struct ModulePort {
    id: PortId,
    events: EventEmitter<MessageBody>,
    sender: mpsc::Sender<(String, Message)>,
}

impl ModulePort {
    /// Creates a port and the handle the module keeps
    pub fn new(id: impl Into<PortId>) -> (Self, ModuleHandle) {
        let id = id.into();
        let events = EventEmitter::new();
        let (sender, receiver) = mpsc::channel();
        let port = Self {
            id: id.clone(),
            events: events.clone(),
            sender,
        };
        let handle = ModuleHandle {
            id,
            events,
            receiver,
            control: None,
            config: None,
            responses: VecDeque::new(),
            inbox: VecDeque::new(),
        };
        (port, handle)
    }
}

impl Port for ModulePort {
    fn id(&self) -> &PortId {
        &self.id
    }

    fn on_message(&mut self, flow: &str, message: Message) {
        if self.sender.send((flow.to_string(), message)).is_err() {
            tracing::debug!("handle of {} dropped, message on {} lost", self.id, flow);
        }
    }

    fn events(&self) -> &EventEmitter<MessageBody> {
        &self.events
    }
}

/// The module-side half
pub struct ModuleHandle {
    id: PortId,
    events: EventEmitter<MessageBody>,
    receiver: mpsc::Receiver<(String, Message)>,
    /// Manager-side control address from the setup handshake
    control: Option<FlowAddress>,
    config: Option<SharedConfig>,
    responses: VecDeque<ControlResponse>,
    inbox: VecDeque<(String, Message)>,
}

impl ModuleHandle {
    /// Port id
    pub fn id(&self) -> &PortId {
        &self.id
    }

    /// Emits `body` on `flow`; the hub routes it
    pub fn send(&self, flow: &str, body: MessageBody) {
        self.events.emit_ref(flow, &body);
    }

    /// Emits an application data message on `flow`
    pub fn send_data(&self, flow: &str, event: impl Into<String>, payload: Value) {
        self.send(flow, MessageBody::data(event, payload));
    }

    fn control(&self, request: ControlRequest) {
        self.send(CONTROL_FLOW, MessageBody::Control(request));
    }

    /// Asks the port manager for a capability by name
    pub fn request_capability(&self, name: impl Into<String>) {
        self.control(ControlRequest::Capability(CapabilityRequest::new(name)));
    }

    /// Asks for the channel factory
    pub fn request_core(&self) {
        self.control(ControlRequest::Capability(CapabilityRequest::core()));
    }

    /// Asks for `flow` to be linked both ways with `to_flow` on `to`
    pub fn link(&self, flow: impl Into<String>, to: impl Into<PortId>, to_flow: impl Into<String>) {
        self.control(ControlRequest::Link {
            flow: flow.into(),
            to: to.into(),
            to_flow: to_flow.into(),
        });
    }

    /// Sends a log line to the debug port
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.control(ControlRequest::Debug {
            level,
            message: message.into(),
        });
    }

    /// Asks the port manager to detach this port
    pub fn close(&self) {
        self.control(ControlRequest::Close);
    }

    /// Sorts everything delivered so far
    ///
    /// Setup handshakes and config broadcasts update the handle's state,
    /// control responses queue for [`ModuleHandle::next_response`], the rest
    /// queues for [`ModuleHandle::take_messages`].
    pub fn poll(&mut self) -> usize {
        let mut count = 0;
        while let Ok((flow, message)) = self.receiver.try_recv() {
            count += 1;
            match message.body {
                MessageBody::Setup(handshake) => {
                    self.control = Some(handshake.channel);
                    self.config = Some(handshake.config);
                }
                MessageBody::Config(config) => self.config = Some(config),
                MessageBody::ControlResponse(response) => self.responses.push_back(response),
                _ => self.inbox.push_back((flow, message)),
            }
        }
        count
    }

    /// Whether the setup handshake has arrived
    pub fn is_set_up(&self) -> bool {
        self.control.is_some()
    }

    /// Manager-side control address allocated at setup
    pub fn control_channel(&self) -> Option<&FlowAddress> {
        self.control.as_ref()
    }

    /// Latest shared configuration seen
    pub fn config(&self) -> Option<&SharedConfig> {
        self.config.as_ref()
    }

    /// Next control response, oldest first
    pub fn next_response(&mut self) -> Option<ControlResponse> {
        self.poll();
        self.responses.pop_front()
    }

    /// Takes the oldest capability response as a channel factory
    ///
    /// Link acknowledgements queued ahead of it stay queued for
    /// [`ModuleHandle::next_response`]. Returns `None` when no capability
    /// response has arrived yet.
    pub fn take_core(&mut self) -> Option<Result<ChannelFactory, CapabilityError>> {
        self.poll();
        let (position, core) = self
            .responses
            .iter()
            .enumerate()
            .find_map(|(position, response)| as_core(response).map(|core| (position, core)))?;
        self.responses.remove(position);
        Some(core)
    }

    /// Drains data and diagnostic traffic, in arrival order
    pub fn take_messages(&mut self) -> Vec<(String, Message)> {
        self.poll();
        self.inbox.drain(..).collect()
    }
}

fn as_core(response: &ControlResponse) -> Option<Result<ChannelFactory, CapabilityError>> {
    match response {
        ControlResponse::Capability(handle) => Some(match CoreProvider::from_handle(handle) {
            Some(provider) => Ok(provider.construct()),
            None => Err(CapabilityError::NotFound(handle.name().to_string())),
        }),
        ControlResponse::Error(error) => Some(Err(error.clone())),
        ControlResponse::Linked { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub::Hub;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_send_routes_through_hub() {
        let mut hub = Hub::new();
        let (alice, alice_handle) = ModulePort::new("alice");
        let (bob, mut bob_handle) = ModulePort::new("bob");
        hub.register(Box::new(alice)).unwrap();
        hub.register(Box::new(bob)).unwrap();
        hub.install(
            FlowAddress::new("alice", "default"),
            FlowAddress::new("bob", "inbox"),
        );

        alice_handle.send_data("default", "greeting", json!("hi"));
        hub.run_until_idle().unwrap();

        let messages = bob_handle.take_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "inbox");
        assert_eq!(messages[0].1.source.port(), Some(&PortId::new("alice")));
    }

    #[test]
    fn test_poll_sorts_control_traffic() {
        let mut hub = Hub::new();
        let (port, mut handle) = ModulePort::new("alice");
        hub.register(Box::new(port)).unwrap();

        let config = Arc::new(json!({"debug": "info"}));
        hub.emit(
            FlowAddress::new("alice", CONTROL_FLOW),
            MessageBody::Setup(ipc::SetupHandshake {
                channel: FlowAddress::new("manager", "alice"),
                config: Arc::clone(&config),
            }),
        );
        hub.emit(
            FlowAddress::new("alice", CONTROL_FLOW),
            MessageBody::ControlResponse(ControlResponse::Error(CapabilityError::NotFound(
                "storage".to_string(),
            ))),
        );
        hub.run_until_idle().unwrap();

        assert_eq!(handle.poll(), 2);
        assert!(handle.is_set_up());
        assert_eq!(
            handle.control_channel(),
            Some(&FlowAddress::new("manager", "alice"))
        );
        assert!(Arc::ptr_eq(handle.config().unwrap(), &config));
        assert!(matches!(
            handle.take_core(),
            Some(Err(CapabilityError::NotFound(_)))
        ));
        assert!(handle.take_messages().is_empty());
    }

    #[test]
    fn test_dropped_handle_does_not_break_delivery() {
        let mut hub = Hub::new();
        let (port, handle) = ModulePort::new("alice");
        hub.register(Box::new(port)).unwrap();
        drop(handle);

        hub.emit(
            FlowAddress::new("alice", "default"),
            MessageBody::data("ping", json!(null)),
        );
        assert_eq!(hub.run_until_idle().unwrap(), 1);
    }
}
