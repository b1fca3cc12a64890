//! Capability interface the room views consume.
//!
//! Everything a view needs from the connection layer, as one object-safe
//! trait, so views never reach into transport internals and tests can
//! substitute a scripted port.

use async_trait::async_trait;

use causette_protocol::ChatMessage;

use crate::error::ClientError;
use crate::rooms::Subscription;

/// Opaque `chat-joined-room` acknowledgement payload.
pub type JoinAck = serde_json::Map<String, serde_json::Value>;

pub type MessageCallback = Box<dyn Fn(ChatMessage) + Send + Sync + 'static>;

#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Join a room; resolves with the server's acknowledgement or
    /// [`ClientError::JoinTimeout`].
    async fn join_room(&self, pseudo: &str, room_name: &str) -> Result<JoinAck, ClientError>;

    /// Fire-and-forget message emit; no server acknowledgement is awaited.
    async fn send_message(
        &self,
        content: &str,
        room_name: &str,
        categorie: Option<&str>,
    ) -> Result<(), ClientError>;

    /// Drain the messages buffered for the room before any subscriber
    /// attached.
    fn buffered_messages(&self, room_name: &str) -> Vec<ChatMessage>;

    /// Register for live messages in the room.
    fn subscribe_messages(&self, room_name: &str, callback: MessageCallback) -> Subscription;

    /// Tear down the shared connection.
    async fn disconnect(&self);
}
