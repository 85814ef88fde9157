//! Contact event dispatch
//!
//! Hosts report spatial contacts as [`ContactEvent`]s. Consumers register a
//! listener per contact-emitting node and receive the listener payloads that
//! match an event's emitter. Listeners can be torn down individually, which
//! is how single-fire subscriptions are expressed.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::scene::NodeId;

new_key_type! {
    /// Handle to a registered contact listener
    pub struct ListenerId;
}

/// A participant touching a contact-emitting node
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactEvent {
    /// Node that emitted the contact (the trigger volume)
    pub emitter: NodeId,
    /// Identity of whoever touched it
    pub participant: NodeId,
    /// Simulation time of the contact in seconds
    pub timestamp: f64,
}

struct Listener<T> {
    emitter: NodeId,
    payload: T,
}

/// Registry of contact listeners keyed by emitter node
pub struct ContactListeners<T> {
    listeners: SlotMap<ListenerId, Listener<T>>,
    by_emitter: FxHashMap<NodeId, SmallVec<[ListenerId; 2]>>,
}

impl<T: Clone> ContactListeners<T> {
    pub fn new() -> Self {
        Self {
            listeners: SlotMap::with_key(),
            by_emitter: FxHashMap::default(),
        }
    }

    /// Register a listener on `emitter` carrying `payload`
    pub fn register(&mut self, emitter: NodeId, payload: T) -> ListenerId {
        let id = self.listeners.insert(Listener { emitter, payload });
        self.by_emitter.entry(emitter).or_default().push(id);
        id
    }

    /// Tear down a listener, returning its payload if it was still active
    pub fn unregister(&mut self, id: ListenerId) -> Option<T> {
        let listener = self.listeners.remove(id)?;
        if let Some(ids) = self.by_emitter.get_mut(&listener.emitter) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_emitter.remove(&listener.emitter);
            }
        }
        Some(listener.payload)
    }

    /// Listeners interested in an event, in registration order
    pub fn dispatch(&self, event: &ContactEvent) -> Vec<(ListenerId, T)> {
        self.by_emitter
            .get(&event.emitter)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| {
                        self.listeners
                            .get(*id)
                            .map(|listener| (*id, listener.payload.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_active(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(id)
    }

    /// Get the number of active listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<T: Clone> Default for ContactListeners<T> {
    fn default() -> Self {
        Self::new()
    }
}
