//! Delivery queue feeding the hub's routing thread.
//!
//! Every producer (ports, the control plane, channel endpoints) posts through a
//! [`HubHandle`]. The hub drains the queue in FIFO order at its scheduling
//! points, so a listener registered before an emit in program order always
//! observes it.
//!
//! Each delivery carries the registration generation of the port it concerns,
//! read when it is posted. A port that is torn down and registered again under
//! the same id gets a new generation, so traffic queued for or by the old
//! registration never reaches or impersonates the new one.

use core_types::{FlowAddress, PortId};
use ipc::{Message, MessageBody, Source};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

/// Current registration generation of every registered port
type Generations = Arc<Mutex<HashMap<PortId, u64>>>;

/// Work item waiting for the routing thread.
pub(crate) enum Delivery {
    /// Port-originated message, routed by `(from, flow)`
    Inbound {
        from: PortId,
        /// Generation of `from` when the message was emitted
        generation: Option<u64>,
        flow: String,
        body: MessageBody,
    },
    /// Message for a known flow address, source already stamped
    Direct {
        target: FlowAddress,
        /// Generation of the target port when the message was posted
        generation: Option<u64>,
        message: Message,
    },
    /// Deferred callback, used by channel endpoints
    Task(Box<dyn FnOnce() + Send>),
}

/// Cloneable handle that posts into a hub's delivery queue
///
/// The handle is `Send`, so contexts running on other threads can hold one.
/// Posting never blocks and never delivers synchronously. It returns `false`
/// only when the hub is gone.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<Delivery>,
    queued: Arc<AtomicUsize>,
    generations: Generations,
}

impl HubHandle {
    pub(crate) fn new(
        sender: mpsc::Sender<Delivery>,
        queued: Arc<AtomicUsize>,
        generations: Generations,
    ) -> Self {
        Self {
            sender,
            queued,
            generations,
        }
    }

    fn generation_of(&self, id: &PortId) -> Option<u64> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    pub(crate) fn set_generation(&self, id: PortId, generation: u64) {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, generation);
    }

    pub(crate) fn clear_generation(&self, id: &PortId) {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn post(&self, delivery: Delivery) -> bool {
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(delivery).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("hub is gone, delivery discarded");
            return false;
        }
        true
    }

    /// Queues a message for `target`, stamped as coming from the hub
    pub fn emit(&self, target: FlowAddress, body: MessageBody) -> bool {
        self.post_direct(target, Message::new(Source::Hub, body))
    }

    /// Queues a message emitted by port `from` on `flow`
    pub fn on_message(&self, from: PortId, flow: impl Into<String>, body: MessageBody) -> bool {
        let generation = self.generation_of(&from);
        self.post(Delivery::Inbound {
            from,
            generation,
            flow: flow.into(),
            body,
        })
    }

    /// Queues a message emitted by one specific registration of `from`
    pub(crate) fn post_inbound(
        &self,
        from: PortId,
        generation: u64,
        flow: impl Into<String>,
        body: MessageBody,
    ) -> bool {
        self.post(Delivery::Inbound {
            from,
            generation: Some(generation),
            flow: flow.into(),
            body,
        })
    }

    /// Queues a callback to run at the next scheduling point
    pub fn schedule<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Delivery::Task(Box::new(task)))
    }

    pub(crate) fn post_direct(&self, target: FlowAddress, message: Message) -> bool {
        let generation = self.generation_of(&target.port);
        self.post(Delivery::Direct {
            target,
            generation,
            message,
        })
    }

    /// Number of deliveries waiting in the queue
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubHandle")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Receiving side, owned by the hub.
pub(crate) struct DeliveryQueue {
    receiver: mpsc::Receiver<Delivery>,
    queued: Arc<AtomicUsize>,
}

impl DeliveryQueue {
    /// Creates a queue and the first handle posting into it.
    pub(crate) fn new() -> (Self, HubHandle) {
        let (sender, receiver) = mpsc::channel();
        let queued = Arc::new(AtomicUsize::new(0));
        let handle = HubHandle::new(sender, Arc::clone(&queued), Generations::default());
        (Self { receiver, queued }, handle)
    }

    /// Pops the next delivery, if any.
    pub(crate) fn pop(&self) -> Option<Delivery> {
        let delivery = self.receiver.try_recv().ok()?;
        self.queued.fetch_sub(1, Ordering::SeqCst);
        Some(delivery)
    }

    /// Returns whether the queue is empty.
    pub(crate) fn is_empty(&self) -> bool {
        self.queued.load(Ordering::SeqCst) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(flow: &str) -> FlowAddress {
        FlowAddress::new("echo", flow)
    }

    #[test]
    fn test_queue_ordering() {
        let (queue, handle) = DeliveryQueue::new();
        handle.emit(target("a"), MessageBody::data("x", json!(1)));
        handle.emit(target("b"), MessageBody::data("x", json!(2)));
        handle.emit(target("c"), MessageBody::data("x", json!(3)));
        assert_eq!(handle.pending(), 3);

        let flows: Vec<String> = std::iter::from_fn(|| queue.pop())
            .map(|delivery| match delivery {
                Delivery::Direct { target, .. } => target.flow,
                _ => panic!("Expected direct delivery"),
            })
            .collect();
        assert_eq!(flows, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_emit_stamps_hub_source() {
        let (queue, handle) = DeliveryQueue::new();
        handle.emit(target("a"), MessageBody::data("x", json!(null)));
        match queue.pop() {
            Some(Delivery::Direct { message, .. }) => assert_eq!(message.source, Source::Hub),
            _ => panic!("Expected direct delivery"),
        }
    }

    #[test]
    fn test_direct_delivery_carries_target_generation() {
        let (queue, handle) = DeliveryQueue::new();
        handle.emit(target("a"), MessageBody::data("x", json!(1)));
        handle.set_generation(PortId::new("echo"), 7);
        handle.emit(target("b"), MessageBody::data("x", json!(2)));
        handle.clear_generation(&PortId::new("echo"));
        handle.on_message(PortId::new("echo"), "out", MessageBody::data("x", json!(3)));

        let generations: Vec<Option<u64>> = std::iter::from_fn(|| queue.pop())
            .map(|delivery| match delivery {
                Delivery::Direct { generation, .. } => generation,
                Delivery::Inbound { generation, .. } => generation,
                Delivery::Task(_) => panic!("Expected a message delivery"),
            })
            .collect();
        assert_eq!(generations, vec![None, Some(7), None]);
    }

    #[test]
    fn test_post_after_queue_dropped() {
        let (queue, handle) = DeliveryQueue::new();
        drop(queue);
        assert!(!handle.schedule(|| {}));
        assert_eq!(handle.pending(), 0);
    }
}
