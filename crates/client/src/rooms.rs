//! Per-room message buffers and subscriber fan-out.
//!
//! One arena keyed by room name. Each entry owns a FIFO buffer for messages
//! that arrived before any subscriber existed, and the set of live
//! listeners. The two delivery paths are complementary: the buffer serves
//! messages from before a view subscribed, the listeners serve everything
//! after, and views collapse the overlap by message id.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};

use causette_protocol::ChatMessage;

use crate::lock;

type Listener = Arc<dyn Fn(ChatMessage) + Send + Sync + 'static>;

#[derive(Default)]
struct RoomEntry {
    buffer: VecDeque<ChatMessage>,
    listeners: HashMap<u64, Listener>,
}

impl RoomEntry {
    fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.listeners.is_empty()
    }
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<String, RoomEntry>,
    next_listener_id: u64,
}

/// Registry of per-room state, created on first touch and dropped once a
/// room has neither buffered messages nor listeners.
#[derive(Default)]
pub struct RoomStates {
    inner: Mutex<Inner>,
}

impl RoomStates {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append to the room's buffer and fan out to every current listener.
    ///
    /// The buffer never drops messages; growth is bounded only by how
    /// promptly rooms are drained. Listeners run outside the registry lock
    /// so a callback may subscribe or drain without deadlocking.
    pub fn deposit(&self, room: &str, msg: ChatMessage) {
        let listeners: Vec<Listener> = {
            let mut inner = lock(&self.inner);
            let entry = inner.rooms.entry(room.to_string()).or_default();
            entry.buffer.push_back(msg.clone());
            entry.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(msg.clone());
        }
    }

    /// Take all buffered messages for the room, in arrival order, emptying
    /// the buffer. Messages deposited after this call are kept for the next
    /// drain.
    pub fn drain(&self, room: &str) -> Vec<ChatMessage> {
        let mut inner = lock(&self.inner);
        let Some(entry) = inner.rooms.get_mut(room) else {
            return Vec::new();
        };
        let drained: Vec<ChatMessage> = entry.buffer.drain(..).collect();
        if entry.is_empty() {
            inner.rooms.remove(room);
        }
        drained
    }

    /// Register a listener for the room. The returned guard removes exactly
    /// this listener; dropping it unsubscribes.
    pub fn subscribe(
        self: &Arc<Self>,
        room: &str,
        listener: impl Fn(ChatMessage) + Send + Sync + 'static,
    ) -> Subscription {
        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner
                .rooms
                .entry(room.to_string())
                .or_default()
                .listeners
                .insert(id, Arc::new(listener));
            id
        };
        Subscription {
            states: Arc::downgrade(self),
            room: room.to_string(),
            id,
            active: true,
        }
    }

    fn remove_listener(&self, room: &str, id: u64) {
        let mut inner = lock(&self.inner);
        if let Some(entry) = inner.rooms.get_mut(room) {
            entry.listeners.remove(&id);
            if entry.is_empty() {
                inner.rooms.remove(room);
            }
        }
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn room_count(&self) -> usize {
        lock(&self.inner).rooms.len()
    }
}

/// Guard for one registered listener.
pub struct Subscription {
    states: Weak<RoomStates>,
    room: String,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Remove the listener. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(states) = self.states.upgrade() {
            states.remove_listener(&self.room, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
