//! The port manager's own attachment to the hub

use core_types::PortId;
use hub::Port;
use ipc::{EventEmitter, Message, MessageBody};
use std::sync::mpsc;

/// Control traffic waiting for the port manager: `(flow, message)`.
///
/// The flow name is the id of the port whose control flow it arrived from.
pub(crate) type ControlEnvelope = (String, Message);

/// Port registered under the manager's id
///
/// It only queues what it receives; the manager handles it after the hub has
/// finished its delivery round, so handling can mutate the hub.
pub(crate) struct ManagerInbox {
    id: PortId,
    events: EventEmitter<MessageBody>,
    sender: mpsc::Sender<ControlEnvelope>,
}

impl ManagerInbox {
    pub(crate) fn new(id: PortId) -> (Self, mpsc::Receiver<ControlEnvelope>) {
        let (sender, receiver) = mpsc::channel();
        let inbox = Self {
            id,
            events: EventEmitter::new(),
            sender,
        };
        (inbox, receiver)
    }
}

impl Port for ManagerInbox {
    fn id(&self) -> &PortId {
        &self.id
    }

    fn on_message(&mut self, flow: &str, message: Message) {
        if self.sender.send((flow.to_string(), message)).is_err() {
            tracing::debug!("port manager gone, control message on {} dropped", flow);
        }
    }

    fn events(&self) -> &EventEmitter<MessageBody> {
        &self.events
    }

    fn describe(&self) -> String {
        format!("[Port {} (control inbox)]", self.id)
    }
}
