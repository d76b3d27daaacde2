//! Channel allocation and rendezvous

use crate::channel::{ChannelShared, ChannelState, Endpoint};
use crate::error::ChannelError;
use core_types::PortId;
use hub::HubHandle;
use ipc::{ChannelIdentifier, ChannelSide};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct ChannelTable {
    next: ChannelIdentifier,
    channels: HashMap<ChannelIdentifier, Arc<ChannelShared>>,
    torn_down: bool,
}

/// Per-port allocator of paired channels
///
/// One party calls [`ChannelFactory::create_channel`] and passes the returned
/// identifier to a peer by any means; the peer calls
/// [`ChannelFactory::bind_channel`] with it and receives the other end.
/// Exactly one bind succeeds per identifier.
///
/// Clones share the same table. Identifiers are only meaningful to the factory
/// (and its clones) that allocated them.
#[derive(Clone)]
pub struct ChannelFactory {
    owner: PortId,
    scheduler: HubHandle,
    table: Arc<Mutex<ChannelTable>>,
}

impl ChannelFactory {
    /// Creates an empty factory owned by `owner`
    pub fn new(owner: PortId, scheduler: HubHandle) -> Self {
        Self {
            owner,
            scheduler,
            table: Arc::new(Mutex::new(ChannelTable {
                next: ChannelIdentifier::new(0),
                channels: HashMap::new(),
                torn_down: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Port that owns this factory
    pub fn owner(&self) -> &PortId {
        &self.owner
    }

    /// Allocates a pending channel and returns its input side
    pub fn create_channel(&self) -> Result<(ChannelIdentifier, Endpoint), ChannelError> {
        let mut table = self.lock();
        if table.torn_down {
            return Err(ChannelError::FactoryTornDown(self.owner.clone()));
        }
        table
            .channels
            .retain(|_, channel| channel.state() != ChannelState::Closed);

        let identifier = table.next;
        table.next = identifier.next();
        let channel = ChannelShared::new(identifier, self.owner.clone(), self.scheduler.clone());
        table.channels.insert(identifier, Arc::clone(&channel));
        tracing::debug!("{} allocated {}", self.owner, identifier);

        Ok((identifier, Endpoint::new(channel, ChannelSide::Input)))
    }

    /// Binds a pending channel and returns its output side
    pub fn bind_channel(&self, identifier: ChannelIdentifier) -> Result<Endpoint, ChannelError> {
        let table = self.lock();
        if table.torn_down {
            return Err(ChannelError::FactoryTornDown(self.owner.clone()));
        }
        match table.channels.get(&identifier) {
            Some(channel) => {
                channel.bind()?;
                Ok(Endpoint::new(Arc::clone(channel), ChannelSide::Output))
            }
            // Allocated earlier and pruned after closing
            None if identifier < table.next => Err(ChannelError::Closed(identifier)),
            None => Err(ChannelError::UnknownChannel(identifier)),
        }
    }

    /// State of a channel still held by the factory
    pub fn channel_state(&self, identifier: ChannelIdentifier) -> Option<ChannelState> {
        self.lock()
            .channels
            .get(&identifier)
            .map(|channel| channel.state())
    }

    /// Number of channels that are not closed
    pub fn len(&self) -> usize {
        self.lock()
            .channels
            .values()
            .filter(|channel| channel.state() != ChannelState::Closed)
            .count()
    }

    /// Returns whether every channel is closed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every channel and refuses further creates and binds
    ///
    /// Returns the number of channels that were open.
    pub fn teardown(&self) -> usize {
        let mut table = self.lock();
        table.torn_down = true;
        let closed = table
            .channels
            .drain()
            .filter(|(_, channel)| channel.close())
            .count();
        tracing::debug!("{} tore down channel factory, {} channels closed", self.owner, closed);
        closed
    }

    /// Returns whether the factory was torn down
    pub fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }
}

impl fmt::Debug for ChannelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelFactory")
            .field("owner", &self.owner)
            .field("open", &self.len())
            .finish()
    }
}
