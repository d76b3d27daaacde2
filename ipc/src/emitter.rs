//! Listener registry shared by ports and channel endpoints
//!
//! Components do not grow `on`/`emit` methods ad hoc. They compose an
//! [`EventEmitter`] and expose it, or implement [`Emitter`] on top of one.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle returned by listener registration, used to remove the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Arc<dyn Fn(&str, &T) + Send + Sync>;

struct Entry<T> {
    id: ListenerId,
    /// `None` listens to every event
    event: Option<String>,
    callback: Callback<T>,
}

struct Registry<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

/// Event registration and emission
pub trait Emitter<T> {
    /// Registers a listener for one event name
    fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static;

    /// Emits an event to the registered listeners
    fn emit(&self, event: &str, payload: T);
}

/// Reusable listener registry
///
/// Cloning an `EventEmitter` yields another handle to the same registry, so a
/// port can keep one clone while the hub subscribes through another.
///
/// Listeners run in registration order, outside the registry lock: a listener
/// may register further listeners or emit again without deadlocking.
pub struct EventEmitter<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> EventEmitter<T> {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, event: Option<String>, callback: Callback<T>) -> ListenerId {
        let mut registry = self.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push(Entry {
            id,
            event,
            callback,
        });
        id
    }

    /// Registers a listener that receives every event with its name
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, &T) + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(listener))
    }

    /// Removes a listener, returning whether it was registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let before = registry.entries.len();
        registry.entries.retain(|entry| entry.id != id);
        registry.entries.len() != before
    }

    /// Emits by reference, returning how many listeners were invoked
    pub fn emit_ref(&self, event: &str, payload: &T) -> usize {
        let callbacks: Vec<Callback<T>> = self
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.event.as_deref().map_or(true, |name| name == event))
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        for callback in &callbacks {
            callback(event, payload);
        }
        callbacks.len()
    }

    /// Returns the number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.lock().entries.len()
    }
}

impl<T> Emitter<T> for EventEmitter<T> {
    fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.insert(
            Some(event.to_string()),
            Arc::new(move |_: &str, payload: &T| listener(payload)),
        )
    }

    fn emit(&self, event: &str, payload: T) {
        self.emit_ref(event, &payload);
    }
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
