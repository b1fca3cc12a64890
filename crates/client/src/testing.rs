//! Test doubles for the transport and port seams.
//!
//! Compiled for unit tests and under the `testing` feature so downstream
//! crates can drive the client without a server.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use causette_protocol::{ChatMessage, ClientMessage, ServerMessage};

use crate::connection::ConnectionState;
use crate::error::ClientError;
use crate::lock;
use crate::port::{ChatPort, JoinAck, MessageCallback};
use crate::rooms::{RoomStates, Subscription};
use crate::transport::{MessageHandler, MessageTransport, StateHandler};

/// In-memory [`MessageTransport`]: records outbound messages and lets the
/// test inject inbound ones.
#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<ClientMessage>>,
    on_message: Mutex<Option<MessageHandler>>,
    on_state_change: Mutex<Option<StateHandler>>,
    connected: AtomicBool,
    connect_attempts: AtomicU32,
    fail_connect: AtomicBool,
    ack_joins: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every outbound join is answered immediately with a
    /// `chat-joined-room` ack echoing the room name.
    pub fn set_ack_joins(&self, ack: bool) {
        self.ack_joins.store(ack, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        lock(&self.sent).clone()
    }

    /// Deliver a server frame through the installed message handler.
    pub fn push_server_message(&self, msg: ServerMessage) {
        let handler = lock(&self.on_message);
        if let Some(ref handler) = *handler {
            handler(msg);
        }
    }

    fn push_state(&self, state: ConnectionState) {
        let handler = lock(&self.on_state_change);
        if let Some(ref handler) = *handler {
            handler(state);
        }
    }
}

#[async_trait]
impl MessageTransport for FakeTransport {
    async fn set_on_message(&self, handler: MessageHandler) {
        *lock(&self.on_message) = Some(handler);
    }

    async fn set_on_state_change(&self, handler: StateHandler) {
        *lock(&self.on_state_change) = Some(handler);
    }

    async fn connect(&self) -> Result<(), ClientError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            self.push_state(ConnectionState::Failed);
            return Err(ClientError::Transport("fake dial failure".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.push_state(ConnectionState::Connected);
        Ok(())
    }

    async fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        let ack = match &message {
            ClientMessage::JoinRoom { room_name, .. }
                if self.ack_joins.load(Ordering::SeqCst) =>
            {
                let mut payload = serde_json::Map::new();
                payload.insert("roomName".into(), serde_json::Value::String(room_name.clone()));
                Some(ServerMessage::RoomJoined { ack: payload })
            }
            _ => None,
        };
        lock(&self.sent).push(message);
        if let Some(ack) = ack {
            self.push_server_message(ack);
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.push_state(ConnectionState::Disconnected);
    }
}

/// What a [`FakePort`] recorded for one `send_message` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub content: String,
    pub room_name: String,
    pub categorie: Option<String>,
}

/// Scripted [`ChatPort`] backed by a real room arena, so buffering,
/// draining, and fan-out behave exactly as in production.
pub struct FakePort {
    rooms: Arc<RoomStates>,
    sent: Mutex<Vec<SentMessage>>,
    joins: Mutex<Vec<(String, String)>>,
    fail_joins: AtomicBool,
}

impl Default for FakePort {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePort {
    pub fn new() -> Self {
        Self {
            rooms: RoomStates::new(),
            sent: Mutex::new(Vec::new()),
            joins: Mutex::new(Vec::new()),
            fail_joins: AtomicBool::new(false),
        }
    }

    /// Make `join_room` fail, to exercise degraded mode.
    pub fn set_fail_joins(&self, fail: bool) {
        self.fail_joins.store(fail, Ordering::SeqCst);
    }

    /// Deliver a message as the server would: buffered and fanned out.
    pub fn deliver(&self, room: &str, msg: ChatMessage) {
        self.rooms.deposit(room, msg);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    pub fn joins(&self) -> Vec<(String, String)> {
        lock(&self.joins).clone()
    }
}

#[async_trait]
impl ChatPort for FakePort {
    async fn join_room(&self, pseudo: &str, room_name: &str) -> Result<JoinAck, ClientError> {
        lock(&self.joins).push((pseudo.to_string(), room_name.to_string()));
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(ClientError::JoinTimeout);
        }
        let mut ack = JoinAck::new();
        ack.insert("roomName".into(), serde_json::Value::String(room_name.into()));
        Ok(ack)
    }

    async fn send_message(
        &self,
        content: &str,
        room_name: &str,
        categorie: Option<&str>,
    ) -> Result<(), ClientError> {
        lock(&self.sent).push(SentMessage {
            content: content.to_string(),
            room_name: room_name.to_string(),
            categorie: categorie.map(str::to_string),
        });
        Ok(())
    }

    fn buffered_messages(&self, room_name: &str) -> Vec<ChatMessage> {
        self.rooms.drain(room_name)
    }

    fn subscribe_messages(&self, room_name: &str, callback: MessageCallback) -> Subscription {
        self.rooms.subscribe(room_name, callback)
    }

    async fn disconnect(&self) {}
}
