//! # Hub
//!
//! This crate implements the process-wide message router.
//!
//! ## Philosophy
//!
//! - **One routing thread**: The hub owns its ports, its routing table and its
//!   delivery queue. Nothing else mutates them.
//! - **Post, don't call**: Producers post into the queue through a
//!   [`HubHandle`]; delivery happens at the next scheduling point
//!   ([`Hub::pump`] / [`Hub::run_until_idle`]).
//! - **Routing failures are diagnostics**: A message for an unknown target is
//!   dropped and reported to the debug port. The sender never sees an error,
//!   because a sender cannot know the delivery topology.
//!
//! ## Routing
//!
//! A port emits on a named flow. The hub looks up the route installed for
//! `(port, flow)`, stamps the message with the emitting port as its source,
//! and delivers it to the destination flow address.

pub mod config;
pub mod error;
pub mod port;
pub mod queue;

pub use config::{HubConfig, DEFAULT_STEP_LIMIT};
pub use error::{HubError, RoutingError};
pub use port::Port;
pub use queue::HubHandle;

use core_types::{FlowAddress, PortId, CONFIG_FLOW, DIAGNOSTIC_FLOW};
use ipc::{
    Diagnostic, ListenerId, LogLevel, Message, MessageBody, SharedConfig, Source,
};
use queue::{Delivery, DeliveryQueue};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Messages handed to a port
    pub delivered: u64,
    /// Messages dropped for lack of a target or route
    pub dropped: u64,
    /// Messages silently discarded because their target or sender was torn down
    pub discarded: u64,
    /// Scheduled tasks run
    pub tasks: u64,
}

struct Registration {
    port: Box<dyn Port>,
    subscription: ListenerId,
    generation: u64,
}

/// The message router
pub struct Hub {
    /// Runtime knobs
    config: HubConfig,
    /// Registered ports, ordered for deterministic broadcast
    ports: BTreeMap<PortId, Registration>,
    /// Routing table: source flow → destination flow
    routes: HashMap<FlowAddress, FlowAddress>,
    /// Generation handed to the most recent registration
    generation: u64,
    /// Configuration installed by the last broadcast
    shared_config: Option<SharedConfig>,
    /// Port receiving diagnostics
    debug: Option<PortId>,
    /// Handle kept by the hub itself; also keeps the queue connected
    handle: HubHandle,
    /// Pending deliveries
    queue: DeliveryQueue,
    /// Delivery counters
    stats: HubStats,
}

impl Hub {
    /// Creates a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Creates a hub with the given configuration
    pub fn with_config(config: HubConfig) -> Self {
        let (queue, handle) = DeliveryQueue::new();
        Self {
            config,
            ports: BTreeMap::new(),
            routes: HashMap::new(),
            generation: 0,
            shared_config: None,
            debug: None,
            handle,
            queue,
            stats: HubStats::default(),
        }
    }

    /// Returns a handle posting into this hub's queue
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    /// Returns the configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Registers a port
    ///
    /// The hub subscribes to every event the port emits. If a shared
    /// configuration is installed, the port receives it on its config flow.
    pub fn register(&mut self, port: Box<dyn Port>) -> Result<(), HubError> {
        let id = port.id().clone();
        if self.ports.contains_key(&id) {
            tracing::warn!("rejected duplicate registration of port {}", id);
            return Err(HubError::DuplicateRegistration(id));
        }

        self.generation += 1;
        let generation = self.generation;
        self.handle.set_generation(id.clone(), generation);

        let handle = self.handle.clone();
        let from = id.clone();
        let subscription = port.events().on_any(move |flow, body: &MessageBody| {
            handle.post_inbound(from.clone(), generation, flow, body.clone());
        });

        if let Some(config) = &self.shared_config {
            self.handle.emit(
                FlowAddress::new(id.clone(), CONFIG_FLOW),
                MessageBody::Config(Arc::clone(config)),
            );
        }

        tracing::debug!("registered {} (generation {})", port.describe(), generation);
        self.ports.insert(
            id,
            Registration {
                port,
                subscription,
                generation,
            },
        );
        Ok(())
    }

    /// Removes a port, its routes and its subscription
    ///
    /// Idempotent. Deliveries still queued for or by the port are discarded,
    /// even if another port registers under the same id before they run.
    pub fn deregister(&mut self, id: &PortId) -> bool {
        let Some(registration) = self.ports.remove(id) else {
            return false;
        };
        registration.port.events().off(registration.subscription);
        self.routes
            .retain(|source, destination| &source.port != id && &destination.port != id);
        if self.debug.as_ref() == Some(id) {
            self.debug = None;
        }
        self.handle.clear_generation(id);
        tracing::debug!("deregistered {}", registration.port.describe());
        true
    }

    /// Returns whether a port is registered
    pub fn is_registered(&self, id: &PortId) -> bool {
        self.ports.contains_key(id)
    }

    /// Returns the number of registered ports
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Describes every registered port
    pub fn describe_ports(&self) -> Vec<String> {
        self.ports
            .values()
            .map(|registration| registration.port.describe())
            .collect()
    }

    /// Marks a registered port as the receiver of diagnostics
    pub fn attach_debug(&mut self, id: PortId) -> Result<(), HubError> {
        if !self.ports.contains_key(&id) {
            return Err(HubError::UnknownPort(id));
        }
        self.debug = Some(id);
        Ok(())
    }

    /// Installs a route, returning the destination it replaced
    pub fn install(&mut self, source: FlowAddress, destination: FlowAddress) -> Option<FlowAddress> {
        tracing::debug!("route {} -> {}", source, destination);
        self.routes.insert(source, destination)
    }

    /// Removes a route
    pub fn uninstall(&mut self, source: &FlowAddress) -> Option<FlowAddress> {
        self.routes.remove(source)
    }

    /// Looks up the destination of a route
    pub fn route(&self, source: &FlowAddress) -> Option<&FlowAddress> {
        self.routes.get(source)
    }

    /// Queues a message for `target`
    pub fn emit(&self, target: FlowAddress, body: MessageBody) {
        self.handle.emit(target, body);
    }

    /// Queues a message as if port `from` had emitted it on `flow`
    pub fn on_message(&self, from: PortId, flow: impl Into<String>, body: MessageBody) {
        self.handle.on_message(from, flow, body);
    }

    /// Queues a diagnostic for the debug port, stamped with `origin`
    pub fn forward_diagnostic(&self, origin: Source, diagnostic: Diagnostic) {
        match &self.debug {
            Some(debug) => {
                self.handle.post_direct(
                    FlowAddress::new(debug.clone(), DIAGNOSTIC_FLOW),
                    Message::new(origin, MessageBody::Diagnostic(diagnostic)),
                );
            }
            None => tracing::debug!("no debug port for diagnostic from {}", origin),
        }
    }

    /// Installs the shared configuration and queues it to every port
    ///
    /// Ports registered later receive the same allocation at registration.
    pub fn broadcast_config(&mut self, config: Value) -> SharedConfig {
        let config = Arc::new(config);
        self.shared_config = Some(Arc::clone(&config));
        for id in self.ports.keys() {
            self.handle.emit(
                FlowAddress::new(id.clone(), CONFIG_FLOW),
                MessageBody::Config(Arc::clone(&config)),
            );
        }
        tracing::info!("config broadcast to {} ports", self.ports.len());
        config
    }

    /// Returns the installed shared configuration
    pub fn shared_config(&self) -> Option<&SharedConfig> {
        self.shared_config.as_ref()
    }

    /// Returns the delivery counters
    pub fn stats(&self) -> HubStats {
        self.stats
    }

    /// Returns whether nothing is waiting for delivery
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Delivers the next queued item, returning whether there was one
    pub fn pump(&mut self) -> bool {
        match self.queue.pop() {
            Some(delivery) => {
                self.dispatch(delivery);
                true
            }
            None => false,
        }
    }

    /// Delivers until the queue is empty
    ///
    /// Returns the number of items delivered, or an error once the configured
    /// step limit is reached with work still queued.
    pub fn run_until_idle(&mut self) -> Result<usize, HubError> {
        let mut steps = 0;
        while self.pump() {
            steps += 1;
            if steps >= self.config.step_limit && !self.is_idle() {
                tracing::warn!("step limit {} reached with work queued", self.config.step_limit);
                return Err(HubError::StepLimitExceeded(self.config.step_limit));
            }
        }
        Ok(steps)
    }

    fn dispatch(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Direct {
                target,
                generation,
                message,
            } => self.deliver(target, generation, message),
            Delivery::Inbound {
                from,
                generation,
                flow,
                body,
            } => {
                let current = self.ports.get(&from).map(|registration| registration.generation);
                if current.is_none() || current != generation {
                    self.stats.discarded += 1;
                    tracing::debug!("discarded {} from torn down port {}", body.kind(), from);
                    return;
                }
                let source = FlowAddress::new(from.clone(), flow);
                match self.routes.get(&source).cloned() {
                    Some(destination) => {
                        self.deliver(destination, None, Message::new(Source::Port(from), body))
                    }
                    None => self.report(RoutingError::NoRoute(source), body.kind()),
                }
            }
            Delivery::Task(task) => {
                self.stats.tasks += 1;
                task();
            }
        }
    }

    /// Hands `message` to its target
    ///
    /// `generation` is the target's registration when the message was posted.
    /// A message posted for a registration that no longer exists is discarded.
    fn deliver(&mut self, target: FlowAddress, generation: Option<u64>, message: Message) {
        match self.ports.get_mut(&target.port) {
            Some(registration)
                if generation.map_or(true, |posted| posted == registration.generation) =>
            {
                tracing::trace!(
                    "deliver {} from {} to {}",
                    message.body.kind(),
                    message.source,
                    target
                );
                self.stats.delivered += 1;
                registration.port.on_message(&target.flow, message);
            }
            _ if generation.is_some() => {
                self.stats.discarded += 1;
                tracing::debug!("discarded {} for torn down {}", message.body.kind(), target);
            }
            _ => self.report(RoutingError::NoSuchTarget(target), message.body.kind()),
        }
    }

    fn report(&mut self, error: RoutingError, kind: &str) {
        self.stats.dropped += 1;
        tracing::warn!("dropped {} message: {}", kind, error);
        let diagnostic = Diagnostic::new(LogLevel::Warn, error.to_string()).with_field("kind", kind);
        self.forward_diagnostic(Source::Hub, diagnostic);
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipc::{EventEmitter, Emitter};
    use serde_json::json;
    use std::sync::Mutex;

    type Inbox = Arc<Mutex<Vec<(String, Message)>>>;

    struct RecordingPort {
        id: PortId,
        events: EventEmitter<MessageBody>,
        inbox: Inbox,
    }

    impl RecordingPort {
        fn new(name: &str) -> (Self, EventEmitter<MessageBody>, Inbox) {
            let events = EventEmitter::new();
            let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
            let port = Self {
                id: PortId::new(name),
                events: events.clone(),
                inbox: Arc::clone(&inbox),
            };
            (port, events, inbox)
        }
    }

    impl Port for RecordingPort {
        fn id(&self) -> &PortId {
            &self.id
        }

        fn on_message(&mut self, flow: &str, message: Message) {
            self.inbox.lock().unwrap().push((flow.to_string(), message));
        }

        fn events(&self) -> &EventEmitter<MessageBody> {
            &self.events
        }
    }

    fn payloads(inbox: &Inbox, flow: &str) -> Vec<Value> {
        inbox
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, _)| f == flow)
            .filter_map(|(_, message)| match &message.body {
                MessageBody::Data { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_emit_is_deferred_until_pump() {
        let mut hub = Hub::new();
        let (port, _, inbox) = RecordingPort::new("echo");
        hub.register(Box::new(port)).unwrap();

        hub.emit(FlowAddress::new("echo", "default"), MessageBody::data("m", json!(1)));
        assert!(inbox.lock().unwrap().is_empty());

        assert_eq!(hub.run_until_idle().unwrap(), 1);
        assert_eq!(payloads(&inbox, "default"), vec![json!(1)]);
        assert_eq!(hub.stats().delivered, 1);
    }

    #[test]
    fn test_route_stamps_source() {
        let mut hub = Hub::new();
        let (a, a_events, _) = RecordingPort::new("a");
        let (b, _, b_inbox) = RecordingPort::new("b");
        hub.register(Box::new(a)).unwrap();
        hub.register(Box::new(b)).unwrap();
        hub.install(FlowAddress::new("a", "out"), FlowAddress::new("b", "in"));

        a_events.emit("out", MessageBody::data("m", json!("hi")));
        hub.run_until_idle().unwrap();

        let inbox = b_inbox.lock().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].0, "in");
        assert_eq!(inbox[0].1.source, Source::Port(PortId::new("a")));
    }

    #[test]
    fn test_delivery_preserves_send_order() {
        let mut hub = Hub::new();
        let (a, a_events, _) = RecordingPort::new("a");
        let (b, _, b_inbox) = RecordingPort::new("b");
        hub.register(Box::new(a)).unwrap();
        hub.register(Box::new(b)).unwrap();
        hub.install(FlowAddress::new("a", "out"), FlowAddress::new("b", "in"));

        for n in 0..5 {
            a_events.emit("out", MessageBody::data("m", json!(n)));
        }
        hub.run_until_idle().unwrap();

        let expected: Vec<Value> = (0..5).map(|n| json!(n)).collect();
        assert_eq!(payloads(&b_inbox, "in"), expected);
    }

    #[test]
    fn test_duplicate_registration_keeps_existing() {
        let mut hub = Hub::new();
        let (first, _, first_inbox) = RecordingPort::new("echo");
        let (second, _, second_inbox) = RecordingPort::new("echo");
        hub.register(Box::new(first)).unwrap();

        let result = hub.register(Box::new(second));
        assert_eq!(result, Err(HubError::DuplicateRegistration(PortId::new("echo"))));

        hub.emit(FlowAddress::new("echo", "default"), MessageBody::data("m", json!(1)));
        hub.run_until_idle().unwrap();
        assert_eq!(first_inbox.lock().unwrap().len(), 1);
        assert!(second_inbox.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_target_reported_to_debug_port() {
        let mut hub = Hub::new();
        let (debug, _, debug_inbox) = RecordingPort::new("debug");
        hub.register(Box::new(debug)).unwrap();
        hub.attach_debug(PortId::new("debug")).unwrap();

        hub.emit(FlowAddress::new("ghost", "default"), MessageBody::data("m", json!(1)));
        hub.run_until_idle().unwrap();

        let inbox = debug_inbox.lock().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].0, DIAGNOSTIC_FLOW);
        match &inbox[0].1.body {
            MessageBody::Diagnostic(diagnostic) => {
                assert_eq!(diagnostic.level, LogLevel::Warn);
                assert!(diagnostic.text.contains("ghost.default"));
            }
            other => panic!("Expected diagnostic, got {:?}", other),
        }
        assert_eq!(hub.stats().dropped, 1);
    }

    #[test]
    fn test_missing_route_dropped() {
        let mut hub = Hub::new();
        let (a, a_events, _) = RecordingPort::new("a");
        hub.register(Box::new(a)).unwrap();

        a_events.emit("nowhere", MessageBody::data("m", json!(1)));
        hub.run_until_idle().unwrap();
        assert_eq!(hub.stats().dropped, 1);
        assert_eq!(hub.stats().delivered, 0);
    }

    #[test]
    fn test_deregister_discards_queued_deliveries() {
        let mut hub = Hub::new();
        let (echo, events, inbox) = RecordingPort::new("echo");
        hub.register(Box::new(echo)).unwrap();

        hub.emit(FlowAddress::new("echo", "default"), MessageBody::data("m", json!(1)));
        assert!(hub.deregister(&PortId::new("echo")));
        assert!(!hub.deregister(&PortId::new("echo")));
        hub.run_until_idle().unwrap();

        assert!(inbox.lock().unwrap().is_empty());
        assert_eq!(hub.stats().discarded, 1);
        assert_eq!(hub.stats().dropped, 0);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn test_reused_id_does_not_receive_queued_deliveries() {
        let mut hub = Hub::new();
        let (old, _, old_inbox) = RecordingPort::new("echo");
        hub.register(Box::new(old)).unwrap();

        hub.emit(FlowAddress::new("echo", "default"), MessageBody::data("m", json!("stale")));
        assert!(hub.deregister(&PortId::new("echo")));

        let (new, _, new_inbox) = RecordingPort::new("echo");
        hub.register(Box::new(new)).unwrap();
        hub.emit(FlowAddress::new("echo", "default"), MessageBody::data("m", json!("fresh")));
        hub.run_until_idle().unwrap();

        assert!(old_inbox.lock().unwrap().is_empty());
        assert_eq!(payloads(&new_inbox, "default"), vec![json!("fresh")]);
        assert_eq!(hub.stats().discarded, 1);
        assert_eq!(hub.stats().delivered, 1);
    }

    #[test]
    fn test_reused_id_does_not_inherit_emitted_messages() {
        let mut hub = Hub::new();
        let (old_a, old_events, _) = RecordingPort::new("a");
        let (b, _, b_inbox) = RecordingPort::new("b");
        hub.register(Box::new(old_a)).unwrap();
        hub.register(Box::new(b)).unwrap();
        hub.install(FlowAddress::new("a", "out"), FlowAddress::new("b", "in"));

        old_events.emit("out", MessageBody::data("m", json!("stale")));
        assert!(hub.deregister(&PortId::new("a")));

        let (new_a, new_events, _) = RecordingPort::new("a");
        hub.register(Box::new(new_a)).unwrap();
        hub.install(FlowAddress::new("a", "out"), FlowAddress::new("b", "in"));
        new_events.emit("out", MessageBody::data("m", json!("fresh")));
        hub.run_until_idle().unwrap();

        assert_eq!(payloads(&b_inbox, "in"), vec![json!("fresh")]);
        assert_eq!(hub.stats().discarded, 1);
        assert_eq!(old_events.listener_count(), 0);
    }

    #[test]
    fn test_emit_to_torn_down_port_is_reported() {
        let mut hub = Hub::new();
        let (echo, _, _) = RecordingPort::new("echo");
        hub.register(Box::new(echo)).unwrap();
        hub.deregister(&PortId::new("echo"));

        hub.emit(FlowAddress::new("echo", "default"), MessageBody::data("m", json!(1)));
        hub.run_until_idle().unwrap();
        assert_eq!(hub.stats().dropped, 1);
        assert_eq!(hub.stats().discarded, 0);
    }

    #[test]
    fn test_config_reaches_early_and_late_ports() {
        let mut hub = Hub::new();
        let (early, _, early_inbox) = RecordingPort::new("early");
        hub.register(Box::new(early)).unwrap();

        let installed = hub.broadcast_config(json!({"debug": "warn"}));

        let (late, _, late_inbox) = RecordingPort::new("late");
        hub.register(Box::new(late)).unwrap();
        hub.run_until_idle().unwrap();

        for inbox in [&early_inbox, &late_inbox] {
            let inbox = inbox.lock().unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].0, CONFIG_FLOW);
            match &inbox[0].1.body {
                MessageBody::Config(config) => assert!(Arc::ptr_eq(config, &installed)),
                other => panic!("Expected config, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_scheduled_task_runs_in_order() {
        let mut hub = Hub::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let handle = hub.handle();
        for n in 0..3 {
            let order = Arc::clone(&order);
            handle.schedule(move || order.lock().unwrap().push(n));
        }
        assert_eq!(order.lock().unwrap().len(), 0);

        hub.run_until_idle().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(hub.stats().tasks, 3);
    }

    #[test]
    fn test_step_limit_stops_runaway_loop() {
        let mut hub = Hub::with_config(HubConfig::default().with_step_limit(10));
        let handle = hub.handle();

        fn again(handle: HubHandle) {
            let next = handle.clone();
            handle.schedule(move || again(next));
        }
        again(handle);

        assert_eq!(hub.run_until_idle(), Err(HubError::StepLimitExceeded(10)));
    }

    #[test]
    fn test_attach_debug_requires_registration() {
        let mut hub = Hub::new();
        assert_eq!(
            hub.attach_debug(PortId::new("debug")),
            Err(HubError::UnknownPort(PortId::new("debug")))
        );
    }

    #[test]
    fn test_describe_ports() {
        let mut hub = Hub::new();
        let (echo, _, _) = RecordingPort::new("echo");
        hub.register(Box::new(echo)).unwrap();
        assert_eq!(hub.describe_ports(), vec!["[Port echo]".to_string()]);
    }
}
