//! Transport seam between the connection manager and the actual socket.
//!
//! The manager only ever talks to [`MessageTransport`], so the production
//! WebSocket client and the in-memory test transport are interchangeable.
//! Reconnection backoff math lives here too; it is plain state with no
//! runtime dependency.

use async_trait::async_trait;

use causette_protocol::{ClientMessage, ServerMessage};

use crate::connection::ConnectionState;
use crate::error::ClientError;

pub type MessageHandler = Box<dyn Fn(ServerMessage) + Send + Sync + 'static>;
pub type StateHandler = Box<dyn Fn(ConnectionState) + Send + Sync + 'static>;

/// A bidirectional, event-oriented connection to the chat server.
///
/// Implementations own the socket; the handlers are installed once by the
/// manager before `connect` and invoked for every inbound frame and state
/// transition.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn set_on_message(&self, handler: MessageHandler);
    async fn set_on_state_change(&self, handler: StateHandler);

    /// Establish the connection. Returns once connected (or with the dial
    /// error); later drops are handled by the transport's own recovery.
    async fn connect(&self) -> Result<(), ClientError>;

    /// Emit one message. No delivery guarantee beyond the socket write.
    async fn send(&self, message: ClientMessage) -> Result<(), ClientError>;

    /// Tear the connection down. Idempotent; cancels any reconnection.
    async fn disconnect(&self);
}

// Reconnection constants
pub const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;
pub const MAX_RETRY_ATTEMPTS: u32 = 10;
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Exponential backoff state for reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    attempts: u32,
    delay_ms: u64,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self {
            attempts: 0,
            delay_ms: INITIAL_RETRY_DELAY_MS,
        }
    }
}

impl BackoffState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= MAX_RETRY_ATTEMPTS
    }

    /// Advance to the next attempt, updating the delay for the subsequent
    /// attempt. Returns the delay to wait *before* performing this attempt,
    /// or `None` when the attempt budget is spent.
    pub fn next_delay_and_advance(&mut self) -> Option<u64> {
        if self.is_exhausted() {
            return None;
        }
        let current_delay = self.delay_ms;
        self.attempts += 1;
        self.delay_ms =
            ((self.delay_ms as f64) * BACKOFF_MULTIPLIER).min(MAX_RETRY_DELAY_MS as f64) as u64;
        Some(current_delay)
    }
}
