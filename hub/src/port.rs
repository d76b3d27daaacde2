//! The contract every component attached to the hub satisfies

use core_types::PortId;
use ipc::{EventEmitter, Message, MessageBody};

/// A component pluggable into the hub
///
/// The hub treats every port the same way, whatever it does with a message:
/// it delivers inbound messages through [`Port::on_message`] and subscribes to
/// [`Port::events`] for outbound ones. The event name a port emits on is the
/// flow name the message leaves on.
pub trait Port: Send {
    /// Process-unique identity
    fn id(&self) -> &PortId;

    /// Receives a message delivered on one of this port's flows
    fn on_message(&mut self, flow: &str, message: Message);

    /// Registry of outbound events
    fn events(&self) -> &EventEmitter<MessageBody>;

    /// Short description for logs and tests
    fn describe(&self) -> String {
        format!("[Port {}]", self.id())
    }
}
