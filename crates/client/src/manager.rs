//! Connection manager: owns the transport, routes inbound messages, and
//! runs the join handshake.
//!
//! The connection is established lazily on first use. Every inbound
//! `chat-msg` is deposited into the room arena under its own room (both the
//! buffer and the live listeners see it; views collapse the overlap by id).
//! Join acknowledgements resolve a one-shot slot correlated to the most
//! recent join call.

use std::sync::atomic::{AtomicU64, AtomicU8};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};

use causette_protocol::{ChatMessage, ClientMessage, ServerMessage};

use crate::config::ClientConfig;
use crate::connection::{set_connection_state, ConnectionState, ConnectionStateObserver};
use crate::error::ClientError;
use crate::lock;
use crate::port::{ChatPort, JoinAck, MessageCallback};
use crate::rooms::{RoomStates, Subscription};
use crate::transport::MessageTransport;
use crate::ws::ChatSocket;

/// Pending join handshake: sequence number and the resolver for its ack.
type PendingJoin = Option<(u64, oneshot::Sender<JoinAck>)>;

pub struct ChatConnection {
    transport: Arc<dyn MessageTransport>,
    rooms: Arc<RoomStates>,
    state: Arc<AtomicU8>,
    current_room: StdMutex<Option<String>>,
    pending_join: Arc<StdMutex<PendingJoin>>,
    join_seq: AtomicU64,
    /// Guards the lazy start so callbacks are wired exactly once per
    /// connection lifetime.
    started: Mutex<bool>,
    join_timeout: Duration,
    default_room: String,
}

impl ChatConnection {
    /// Manager over the production WebSocket transport.
    pub fn new(config: &ClientConfig) -> Arc<Self> {
        Self::with_transport(Arc::new(ChatSocket::new(&config.server_url)), config)
    }

    /// Manager over any transport (tests inject an in-memory one).
    pub fn with_transport(
        transport: Arc<dyn MessageTransport>,
        config: &ClientConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            rooms: RoomStates::new(),
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8())),
            current_room: StdMutex::new(None),
            pending_join: Arc::new(StdMutex::new(None)),
            join_seq: AtomicU64::new(0),
            started: Mutex::new(false),
            join_timeout: config.join_timeout(),
            default_room: config.default_room.clone(),
        })
    }

    /// Wire the inbound pipeline and connect, once. Subsequent calls are
    /// no-ops until `disconnect` resets the flag.
    async fn ensure_started(&self) -> Result<(), ClientError> {
        let mut started = self.started.lock().await;
        if *started {
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        self.transport
            .set_on_state_change(Box::new(move |new_state| {
                set_connection_state(&state, new_state);
            }))
            .await;

        let rooms = Arc::clone(&self.rooms);
        let pending = Arc::clone(&self.pending_join);
        let default_room = self.default_room.clone();
        self.transport
            .set_on_message(Box::new(move |msg| match msg {
                ServerMessage::RoomJoined { ack } => {
                    if let Some((_, resolver)) = lock(&pending).take() {
                        let _ = resolver.send(ack);
                    } else {
                        tracing::debug!("room-joined ack with no pending join");
                    }
                }
                ServerMessage::Chat { message } => {
                    let room = message
                        .room_name
                        .clone()
                        .unwrap_or_else(|| default_room.clone());
                    rooms.deposit(&room, message);
                }
                ServerMessage::Unknown => {
                    tracing::debug!("ignoring unknown server event");
                }
            }))
            .await;

        self.transport.connect().await?;
        *started = true;
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(std::sync::atomic::Ordering::SeqCst))
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver::new(Arc::clone(&self.state))
    }

    /// The room whose join was last acknowledged, if any.
    pub fn current_room(&self) -> Option<String> {
        lock(&self.current_room).clone()
    }
}

#[async_trait]
impl ChatPort for ChatConnection {
    async fn join_room(&self, pseudo: &str, room_name: &str) -> Result<JoinAck, ClientError> {
        self.ensure_started().await?;

        let seq = self
            .join_seq
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let (resolver, ack_rx) = oneshot::channel();
        // most recent call wins; a superseded join's resolver is dropped
        // and its caller observes Cancelled
        *lock(&self.pending_join) = Some((seq, resolver));

        self.transport
            .send(ClientMessage::join_room(pseudo, room_name))
            .await?;

        match tokio::time::timeout(self.join_timeout, ack_rx).await {
            Ok(Ok(ack)) => {
                *lock(&self.current_room) = Some(room_name.to_string());
                tracing::info!(room = %room_name, "joined room");
                Ok(ack)
            }
            Ok(Err(_)) => Err(ClientError::Cancelled),
            Err(_) => {
                // deregister our listener; a newer join's slot is left alone
                let mut slot = lock(&self.pending_join);
                if slot.as_ref().is_some_and(|(pending_seq, _)| *pending_seq == seq) {
                    *slot = None;
                }
                drop(slot);
                tracing::warn!(room = %room_name, pseudo = %pseudo, "join timed out");
                Err(ClientError::JoinTimeout)
            }
        }
    }

    async fn send_message(
        &self,
        content: &str,
        room_name: &str,
        categorie: Option<&str>,
    ) -> Result<(), ClientError> {
        self.ensure_started().await?;
        self.transport
            .send(ClientMessage::Chat {
                content: content.to_string(),
                room_name: room_name.to_string(),
                categorie: categorie.map(str::to_string),
            })
            .await
    }

    fn buffered_messages(&self, room_name: &str) -> Vec<ChatMessage> {
        self.rooms.drain(room_name)
    }

    fn subscribe_messages(&self, room_name: &str, callback: MessageCallback) -> Subscription {
        self.rooms.subscribe(room_name, callback)
    }

    async fn disconnect(&self) {
        let mut started = self.started.lock().await;
        *started = false;
        *lock(&self.pending_join) = None;
        *lock(&self.current_room) = None;
        self.transport.disconnect().await;
        set_connection_state(&self.state, ConnectionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn manager(transport: Arc<FakeTransport>) -> Arc<ChatConnection> {
        ChatConnection::with_transport(transport, &ClientConfig::default())
    }

    fn chat(room: Option<&str>, content: &str) -> ServerMessage {
        let mut message = ChatMessage::text(content);
        message.room_name = room.map(str::to_string);
        ServerMessage::Chat { message }
    }

    #[tokio::test]
    async fn join_room_resolves_with_the_ack_and_sets_current_room() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_ack_joins(true);
        let connection = manager(Arc::clone(&transport));

        let ack = connection.join_room("alice", "amis").await.expect("join");
        assert_eq!(ack["roomName"], "amis");
        assert_eq!(connection.current_room().as_deref(), Some("amis"));
        assert_eq!(connection.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn join_room_times_out_and_deregisters_the_pending_listener() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_ack_joins(false);
        let connection = manager(Arc::clone(&transport));

        let result = connection.join_room("alice", "amis").await;
        assert!(matches!(result, Err(ClientError::JoinTimeout)));
        assert_eq!(connection.current_room(), None);

        // a late, unrelated ack must not resolve the stale handshake
        transport.push_server_message(ServerMessage::RoomJoined {
            ack: serde_json::Map::new(),
        });
        assert_eq!(connection.current_room(), None);

        // and the slot is clean for the next join
        transport.set_ack_joins(true);
        connection.join_room("alice", "amis").await.expect("join");
        assert_eq!(connection.current_room().as_deref(), Some("amis"));
    }

    #[tokio::test]
    async fn connection_is_established_lazily_exactly_once() {
        let transport = Arc::new(FakeTransport::new());
        let connection = manager(Arc::clone(&transport));
        assert_eq!(transport.connect_attempts(), 0);

        connection.send_message("one", "general", None).await.expect("send");
        connection.send_message("two", "general", None).await.expect("send");
        assert_eq!(transport.connect_attempts(), 1);
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn inbound_messages_are_routed_by_their_own_room() {
        let transport = Arc::new(FakeTransport::new());
        let connection = manager(Arc::clone(&transport));
        connection.send_message("warm-up", "general", None).await.expect("send");

        transport.push_server_message(chat(Some("amis"), "salut"));
        transport.push_server_message(chat(None, "untagged"));

        let amis = connection.buffered_messages("amis");
        assert_eq!(amis.len(), 1);
        assert_eq!(amis[0].content_str(), Some("salut"));

        // no roomName: falls back to the default room
        let general = connection.buffered_messages("general");
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].content_str(), Some("untagged"));

        assert!(connection.buffered_messages("amis").is_empty());
    }

    #[tokio::test]
    async fn live_messages_fan_out_to_every_subscriber() {
        let transport = Arc::new(FakeTransport::new());
        let connection = manager(Arc::clone(&transport));
        connection.send_message("warm-up", "general", None).await.expect("send");

        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let first_count = Arc::clone(&first);
        let _sub1 = connection.subscribe_messages(
            "general",
            Box::new(move |_| {
                first_count.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let second_count = Arc::clone(&second);
        let _sub2 = connection.subscribe_messages(
            "general",
            Box::new(move |_| {
                second_count.fetch_add(1, Ordering::SeqCst);
            }),
        );

        transport.push_server_message(chat(Some("general"), "hello"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_resets_for_reconnection() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_ack_joins(true);
        let connection = manager(Arc::clone(&transport));

        connection.join_room("alice", "general").await.expect("join");
        connection.disconnect().await;
        connection.disconnect().await;
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(connection.current_room(), None);
        assert!(!transport.is_connected());

        // next use re-establishes the connection
        connection.send_message("back", "general", None).await.expect("send");
        assert_eq!(transport.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn failed_dial_surfaces_and_stays_unstarted() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_fail_connect(true);
        let connection = manager(Arc::clone(&transport));

        let result = connection.send_message("hi", "general", None).await;
        assert!(matches!(result, Err(ClientError::Transport(_))));

        transport.set_fail_connect(false);
        connection.send_message("hi", "general", None).await.expect("send");
        assert_eq!(transport.connect_attempts(), 2);
    }
}
