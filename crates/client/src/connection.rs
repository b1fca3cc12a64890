//! Connection state tracking.
//!
//! The state lives in an atomic so the manager, the transport callbacks,
//! and any number of UI observers can share it without locking.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// State of the single realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the server
    Disconnected,
    /// Attempting to establish connection
    Connecting,
    /// Successfully connected
    Connected,
    /// Connection lost, the transport is retrying
    Reconnecting,
    /// Connection failed (dial error or retries exhausted)
    Failed,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
            ConnectionState::Failed => 4,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Read-only view of the connection state for UI binding. Cloneable;
/// every clone observes the same underlying state.
#[derive(Clone)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    pub fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Store a new state (used by the manager's transport callbacks).
pub(crate) fn set_connection_state(state: &AtomicU8, new_state: ConnectionState) {
    state.store(new_state.to_u8(), Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_atomic_encoding() {
        let states = [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Failed,
        ];
        for state in states {
            assert_eq!(ConnectionState::from_u8(state.to_u8()), state);
        }
    }

    #[test]
    fn observer_reads_shared_state() {
        let state = Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8()));
        let observer = ConnectionStateObserver::new(Arc::clone(&state));

        assert!(!observer.is_connected());
        set_connection_state(&state, ConnectionState::Connected);
        assert!(observer.is_connected());
    }
}
