//! Error taxonomy for the client core.
//!
//! Inbound classification never fails (malformed content degrades to opaque
//! text), so these errors only surface from user-initiated actions: joining,
//! sending, uploading, and the HTTP collaborators. No operation is retried
//! automatically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No `chat-joined-room` acknowledgement arrived in time. The pending
    /// listener has been deregistered; the join is not retried.
    #[error("no room-joined acknowledgement from the server")]
    JoinTimeout,

    /// The join handshake was abandoned because a newer join superseded it
    /// or the connection was torn down.
    #[error("join cancelled")]
    Cancelled,

    /// The transport has no active connection to emit on.
    #[error("not connected")]
    NotConnected,

    /// Handing the message to the transport failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Transport-level failure (dial error, socket error).
    #[error("transport error: {0}")]
    Transport(String),

    /// Image upload was rejected or the HTTP call failed. Aborts the
    /// pending send; the message is never queued.
    #[error("image upload failed: {0}")]
    Upload(String),

    /// HTTP collaborator request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP collaborator answered with `success: false`.
    #[error("server rejected the request: {0}")]
    Api(String),
}
