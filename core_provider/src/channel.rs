//! Paired channels and their endpoints

use crate::error::ChannelError;
use core_types::PortId;
use hub::HubHandle;
use ipc::{ChannelIdentifier, ChannelSide, Emitter, EventEmitter, ListenerId};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of a channel
///
/// `Pending` until the peer binds, then `Connected`. Either state may move to
/// `Closed`, which is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Allocated, input side handed out, peer not bound yet
    Pending,
    /// Peer bound; both sides deliver to each other
    Connected,
    /// Released; sends are ignored and binds fail
    Closed,
}

struct ChannelInner {
    state: ChannelState,
    /// Sends on the input side made before the peer bound
    buffered: Vec<(String, Value)>,
    /// Which sides have been dropped
    released: [bool; 2],
}

pub(crate) struct ChannelShared {
    identifier: ChannelIdentifier,
    owner: PortId,
    scheduler: HubHandle,
    inner: Mutex<ChannelInner>,
    /// Receive listeners, indexed by side
    listeners: [EventEmitter<Value>; 2],
}

impl ChannelShared {
    pub(crate) fn new(
        identifier: ChannelIdentifier,
        owner: PortId,
        scheduler: HubHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            identifier,
            owner,
            scheduler,
            inner: Mutex::new(ChannelInner {
                state: ChannelState::Pending,
                buffered: Vec::new(),
                released: [false; 2],
            }),
            listeners: [EventEmitter::new(), EventEmitter::new()],
        })
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.lock().state
    }

    fn send(self: &Arc<Self>, from: ChannelSide, event: &str, payload: Value) {
        let mut inner = self.lock();
        match inner.state {
            ChannelState::Closed => {
                tracing::debug!("send on closed {} of {} ignored", self.identifier, self.owner);
            }
            ChannelState::Pending => inner.buffered.push((event.to_string(), payload)),
            ChannelState::Connected => self.schedule(from.peer(), event.to_string(), payload),
        }
    }

    fn schedule(self: &Arc<Self>, to: ChannelSide, event: String, payload: Value) {
        let channel = Arc::clone(self);
        self.scheduler
            .schedule(move || channel.deliver(to, &event, &payload));
    }

    fn deliver(&self, to: ChannelSide, event: &str, payload: &Value) {
        if self.state() == ChannelState::Closed {
            tracing::trace!("discarded delivery on closed {}", self.identifier);
            return;
        }
        self.listeners[to.index()].emit_ref(event, payload);
    }

    pub(crate) fn bind(self: &Arc<Self>) -> Result<(), ChannelError> {
        let mut inner = self.lock();
        match inner.state {
            ChannelState::Pending => {
                inner.state = ChannelState::Connected;
                let buffered = std::mem::take(&mut inner.buffered);
                for (event, payload) in buffered {
                    self.schedule(ChannelSide::Output, event, payload);
                }
                tracing::debug!("{} of {} connected", self.identifier, self.owner);
                Ok(())
            }
            ChannelState::Connected => Err(ChannelError::AlreadyBound(self.identifier)),
            ChannelState::Closed => Err(ChannelError::Closed(self.identifier)),
        }
    }

    pub(crate) fn close(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == ChannelState::Closed {
            return false;
        }
        inner.state = ChannelState::Closed;
        inner.buffered.clear();
        tracing::debug!("{} of {} closed", self.identifier, self.owner);
        true
    }

    /// Marks one side as dropped
    ///
    /// The channel closes once both sides are gone. A pending channel has
    /// only its input side, so losing it leaves nothing to bind to.
    fn release(&self, side: ChannelSide) {
        let unreachable = {
            let mut inner = self.lock();
            inner.released[side.index()] = true;
            let orphaned = side == ChannelSide::Input && inner.state == ChannelState::Pending;
            orphaned || inner.released.iter().all(|released| *released)
        };
        if unreachable {
            self.close();
        }
    }
}

/// One end of a channel
///
/// Listeners registered with [`Emitter::on`] receive what the other end
/// emits, at the hub's next scheduling point, in send order. Dropping both
/// ends closes the channel, as does dropping the input side before a bind.
pub struct Endpoint {
    channel: Arc<ChannelShared>,
    side: ChannelSide,
}

impl Endpoint {
    pub(crate) fn new(channel: Arc<ChannelShared>, side: ChannelSide) -> Self {
        Self { channel, side }
    }

    /// Identifier of the channel
    pub fn identifier(&self) -> ChannelIdentifier {
        self.channel.identifier
    }

    /// Which side this endpoint is
    pub fn side(&self) -> ChannelSide {
        self.side
    }

    /// Current channel state
    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Removes a receive listener
    pub fn off(&self, id: ListenerId) -> bool {
        self.channel.listeners[self.side.index()].off(id)
    }

    /// Closes the channel for both sides
    ///
    /// Immediate and idempotent. Deliveries already queued are discarded.
    pub fn close(&self) {
        self.channel.close();
    }
}

impl Emitter<Value> for Endpoint {
    fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.channel.listeners[self.side.index()].on(event, listener)
    }

    /// Sends to the other side
    ///
    /// Buffered while the channel is pending, ignored once it is closed.
    fn emit(&self, event: &str, payload: Value) {
        self.channel.send(self.side, event, payload);
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.channel.release(self.side);
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("identifier", &self.channel.identifier)
            .field("side", &self.side)
            .field("state", &self.state())
            .finish()
    }
}
