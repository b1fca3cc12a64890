//! Production WebSocket transport (tokio-tungstenite).
//!
//! One `ChatSocket` owns at most one live connection. Inbound frames are
//! parsed and handed to the installed message handler; unexpected closes
//! trigger reconnection with exponential backoff unless the disconnect was
//! requested. Transport errors are logged and end the current connection;
//! they are never surfaced as message-level failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use causette_protocol::{ClientMessage, ServerMessage};

use crate::connection::ConnectionState;
use crate::error::ClientError;
use crate::transport::{
    BackoffState, MessageHandler, MessageTransport, StateHandler, MAX_RETRY_ATTEMPTS,
};

pub struct ChatSocket {
    url: String,
    /// Sender into the write task of the live connection, if any.
    tx: Arc<Mutex<Option<mpsc::Sender<ClientMessage>>>>,
    /// Read task of the live connection; aborted on `disconnect`.
    read_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    on_message: Arc<Mutex<Option<MessageHandler>>>,
    on_state_change: Arc<Mutex<Option<StateHandler>>>,
    /// Set when `disconnect` was requested, to suppress reconnection.
    intentional_disconnect: Arc<RwLock<bool>>,
}

impl ChatSocket {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tx: Arc::new(Mutex::new(None)),
            read_task: Arc::new(Mutex::new(None)),
            on_message: Arc::new(Mutex::new(None)),
            on_state_change: Arc::new(Mutex::new(None)),
            intentional_disconnect: Arc::new(RwLock::new(false)),
        }
    }

    async fn set_state(&self, new_state: ConnectionState) {
        let handler = self.on_state_change.lock().await;
        if let Some(ref handler) = *handler {
            handler(new_state);
        }
    }

    /// Dial once and spawn the read/write tasks. Returns as soon as the
    /// connection is up.
    ///
    /// Boxed and type-erased: the read task re-enters this through
    /// `reconnect_with_backoff`, so the future type must not be recursive.
    fn open_socket(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.set_state(ConnectionState::Connecting).await;

            let ws_stream = match connect_async(&self.url).await {
                Ok((ws_stream, _)) => ws_stream,
                Err(e) => {
                    tracing::error!("failed to connect to chat server: {e}");
                    self.set_state(ConnectionState::Failed).await;
                    return Err(ClientError::Transport(e.to_string()));
                }
            };
            tracing::info!("connected to chat server at {}", self.url);

            let (mut write, mut read) = ws_stream.split();

            let (tx, mut rx) = mpsc::channel::<ClientMessage>(32);
            {
                let mut tx_slot = self.tx.lock().await;
                *tx_slot = Some(tx);
            }

            tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("failed to serialize outbound message: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Message::Text(json)).await {
                        tracing::error!("failed to send message: {e}");
                        break;
                    }
                }
            });

            let socket = self.clone();
            let reader = tokio::spawn(async move {
                let mut unexpected_close = false;
                while let Some(frame) = read.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(server_msg) => {
                                    let handler = socket.on_message.lock().await;
                                    if let Some(ref handler) = *handler {
                                        handler(server_msg);
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!("failed to parse server message: {e}");
                                }
                            }
                        }
                        Ok(Message::Close(_)) => {
                            tracing::info!("server closed connection");
                            unexpected_close = !*socket.intentional_disconnect.read().await;
                            break;
                        }
                        Ok(Message::Ping(_)) => {}
                        Err(e) => {
                            tracing::error!("websocket error: {e}");
                            unexpected_close = true;
                            break;
                        }
                        _ => {}
                    }
                }

                {
                    let mut tx_slot = socket.tx.lock().await;
                    *tx_slot = None;
                }
                socket.set_state(ConnectionState::Disconnected).await;

                if unexpected_close && !*socket.intentional_disconnect.read().await {
                    tracing::info!("connection closed unexpectedly, initiating reconnection");
                    socket.reconnect_with_backoff().await;
                }
            });
            {
                let mut task_slot = self.read_task.lock().await;
                *task_slot = Some(reader);
            }

            // announced last so observers never see Connected before the
            // connection can actually carry a send
            self.set_state(ConnectionState::Connected).await;
            Ok(())
        })
    }

    async fn reconnect_with_backoff(&self) {
        let mut backoff = BackoffState::default();

        loop {
            self.set_state(ConnectionState::Reconnecting).await;
            let Some(delay) = backoff.next_delay_and_advance() else {
                tracing::error!("max reconnection attempts reached, giving up");
                self.set_state(ConnectionState::Failed).await;
                return;
            };
            tracing::info!(
                "reconnection attempt {} of {}, waiting {}ms",
                backoff.attempts(),
                MAX_RETRY_ATTEMPTS,
                delay
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if *self.intentional_disconnect.read().await {
                tracing::info!("reconnection cancelled, disconnect was requested");
                self.set_state(ConnectionState::Disconnected).await;
                return;
            }

            match self.open_socket().await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!("reconnection attempt {} failed: {e}", backoff.attempts());
                }
            }
        }
    }
}

#[async_trait]
impl MessageTransport for ChatSocket {
    async fn set_on_message(&self, handler: MessageHandler) {
        let mut slot = self.on_message.lock().await;
        *slot = Some(handler);
    }

    async fn set_on_state_change(&self, handler: StateHandler) {
        let mut slot = self.on_state_change.lock().await;
        *slot = Some(handler);
    }

    async fn connect(&self) -> Result<(), ClientError> {
        {
            let mut flag = self.intentional_disconnect.write().await;
            *flag = false;
        }
        if self.tx.lock().await.is_some() {
            return Ok(());
        }
        self.open_socket().await
    }

    async fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        // clone the sender rather than holding the lock across the await
        let tx = {
            let tx_slot = self.tx.lock().await;
            tx_slot.clone()
        };
        match tx {
            Some(tx) => tx
                .send(message)
                .await
                .map_err(|e| ClientError::SendFailed(e.to_string())),
            None => Err(ClientError::NotConnected),
        }
    }

    async fn disconnect(&self) {
        {
            let mut flag = self.intentional_disconnect.write().await;
            *flag = true;
        }
        {
            let mut tx_slot = self.tx.lock().await;
            *tx_slot = None;
        }
        // stop the read task so the socket is really dropped and no frame
        // the server sends after this point reaches the handler
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        self.set_state(ConnectionState::Disconnected).await;
    }
}

impl Clone for ChatSocket {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            tx: Arc::clone(&self.tx),
            read_task: Arc::clone(&self.read_task),
            on_message: Arc::clone(&self.on_message),
            on_state_change: Arc::clone(&self.on_state_change),
            intentional_disconnect: Arc::clone(&self.intentional_disconnect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::net::TcpListener;

    /// Minimal in-process server: accepts one connection, records the first
    /// inbound frame, then pushes one frame back.
    async fn one_shot_server(
        listener: TcpListener,
        reply: String,
        got_join: Arc<AtomicBool>,
    ) {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            if text.contains("chat-join-room") {
                got_join.store(true, Ordering::SeqCst);
            }
        }
        ws.send(Message::Text(reply)).await.expect("reply");
    }

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let got_join = Arc::new(AtomicBool::new(false));
        let server = tokio::spawn(one_shot_server(
            listener,
            r#"{"type":"chat-msg","content":"welcome","roomName":"general"}"#.into(),
            Arc::clone(&got_join),
        ));

        let socket = ChatSocket::new(format!("ws://{addr}"));
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(8);
        socket
            .set_on_message(Box::new(move |msg| {
                let _ = msg_tx.try_send(msg);
            }))
            .await;

        socket.connect().await.expect("connect");
        socket
            .send(ClientMessage::join_room("alice", "general"))
            .await
            .expect("send");

        let inbound = tokio::time::timeout(Duration::from_secs(5), msg_rx.recv())
            .await
            .expect("inbound frame")
            .expect("channel open");
        match inbound {
            ServerMessage::Chat { message } => {
                assert_eq!(message.content_str(), Some("welcome"));
            }
            other => panic!("expected chat message, got {other:?}"),
        }

        server.await.expect("server task");
        assert!(got_join.load(Ordering::SeqCst));

        socket.disconnect().await;
        assert!(matches!(
            socket.send(ClientMessage::join_room("alice", "general")).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn connect_to_unreachable_server_fails() {
        let socket = ChatSocket::new("ws://127.0.0.1:1");
        assert!(matches!(
            socket.connect().await,
            Err(ClientError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn unexpected_close_triggers_reconnection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            // the first connection is dropped right after the handshake,
            // the second one stays up until the client sends something
            let (stream, _) = listener.accept().await.expect("accept");
            let ws = tokio_tungstenite::accept_async(stream).await.expect("handshake");
            drop(ws);
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("handshake");
            let _ = ws.next().await;
        });

        let socket = ChatSocket::new(format!("ws://{addr}"));
        let (state_tx, mut state_rx) = mpsc::channel::<ConnectionState>(16);
        socket
            .set_on_state_change(Box::new(move |state| {
                let _ = state_tx.try_send(state);
            }))
            .await;
        socket.connect().await.expect("connect");

        let mut seen = Vec::new();
        loop {
            let state = tokio::time::timeout(Duration::from_secs(10), state_rx.recv())
                .await
                .expect("state change")
                .expect("channel open");
            seen.push(state);
            let connected = seen
                .iter()
                .filter(|s| **s == ConnectionState::Connected)
                .count();
            if connected == 2 {
                break;
            }
        }
        assert!(seen.contains(&ConnectionState::Reconnecting));

        socket
            .send(ClientMessage::join_room("alice", "general"))
            .await
            .expect("send after reconnect");

        socket.disconnect().await;
        let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    }

    #[tokio::test]
    async fn no_frames_are_delivered_after_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("handshake");
            // wait until the peer tears the connection down, then try to
            // push one more frame at it
            while let Some(Ok(_)) = ws.next().await {}
            let _ = ws
                .send(Message::Text(
                    r#"{"type":"chat-msg","content":"ghost","roomName":"general"}"#.into(),
                ))
                .await;
        });

        let socket = ChatSocket::new(format!("ws://{addr}"));
        let delivered = Arc::new(AtomicU32::new(0));
        let count = Arc::clone(&delivered);
        socket
            .set_on_message(Box::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }))
            .await;

        socket.connect().await.expect("connect");
        socket.disconnect().await;

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server noticed the teardown")
            .expect("server task");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }
}
