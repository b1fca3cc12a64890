//! Realtime chat client: connection management, room message sync, and the
//! per-room view model.
//!
//! The layering is strict: [`RoomView`] talks to a [`ChatPort`], the
//! production port ([`ChatConnection`]) talks to a [`MessageTransport`], and
//! only the transport knows about sockets. Each seam has an in-memory
//! implementation for tests.

pub mod classify;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod manager;
pub mod port;
pub mod room_view;
pub mod rooms;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod util;
pub mod ws;

pub use classify::{classify, classify_now, DisplayMessage, Sender};
pub use config::{ClientConfig, DEFAULT_ROOM};
pub use connection::{ConnectionState, ConnectionStateObserver};
pub use error::ClientError;
pub use http::{ApiClient, ImageUpload, RoomInfo};
pub use manager::ChatConnection;
pub use port::{ChatPort, JoinAck};
pub use room_view::RoomView;
pub use rooms::{RoomStates, Subscription};
pub use transport::MessageTransport;
pub use util::{normalize_room_name, RoomLabel};
pub use ws::ChatSocket;

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
