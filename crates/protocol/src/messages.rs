//! Realtime event types exchanged with the chat server.
//!
//! Every frame on the wire is a JSON object tagged by `type` with the event
//! name. The server predates this client and is loose about payload shapes,
//! so [`ChatMessage`] keeps unrecognized fields verbatim instead of
//! rejecting them.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Unknown inbound event types deserialize to the `Unknown` variant

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content prefix used for inline (data-URI) image payloads.
pub const INLINE_IMAGE_PREFIX: &str = "data:image/";

/// Marker that precedes an image URL inside a plain-text content field.
pub const IMAGE_LINK_MARKER: &str = "[IMAGE]";

/// Server-assigned or inferred message categories.
pub mod categories {
    pub const NEW_IMAGE: &str = "NEW_IMAGE";
    pub const LOCATION: &str = "LOCATION";
    pub const INFO: &str = "INFO";
}

/// A chat message as it appears on the wire.
///
/// `content` is either a plain string or a structured payload; everything
/// else is optional. Fields this client does not interpret are preserved in
/// `extra` (servers attach ids, avatars, and the like).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pseudo: Option<String>,
    /// Emission timestamp (RFC 3339); receipt time is used when absent.
    #[serde(rename = "dateEmis", default, skip_serializing_if = "Option::is_none")]
    pub date_emis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorie: Option<String>,
    #[serde(rename = "roomName", default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChatMessage {
    /// Build a plain text message, the common case in tests and fixtures.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            pseudo: None,
            date_emis: None,
            categorie: None,
            room_name: None,
            extra: serde_json::Map::new(),
        }
    }

    /// The content as a string slice, when it is one.
    pub fn content_str(&self) -> Option<&str> {
        self.content.as_str()
    }

    /// Server-provided stable identifier, when one was attached.
    pub fn wire_id(&self) -> Option<String> {
        match self.extra.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Structured location content: `{"type":"LOCATION","lat":…,"lng":…}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LocationPayload {
    #[serde(rename = "type")]
    pub kind: LocationTag,
    pub lat: f64,
    pub lng: f64,
}

/// The tag is fixed; anything else fails to parse and falls back to text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationTag {
    #[serde(rename = "LOCATION")]
    Location,
}

impl LocationPayload {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            kind: LocationTag::Location,
            lat,
            lng,
        }
    }
}

// =============================================================================
// Client Messages (client → server)
// =============================================================================

/// Events emitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join request. The pseudo is sent under two key aliases because
    /// deployed servers disagree on which one they read.
    #[serde(rename = "chat-join-room")]
    JoinRoom {
        #[serde(rename = "roomName")]
        room_name: String,
        pseudo: String,
        #[serde(rename = "myPseudo")]
        my_pseudo: String,
    },
    /// Fire-and-forget chat message.
    #[serde(rename = "chat-msg")]
    Chat {
        content: String,
        #[serde(rename = "roomName")]
        room_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        categorie: Option<String>,
    },
}

impl ClientMessage {
    /// Join request with the pseudo mirrored into both aliases.
    pub fn join_room(pseudo: impl Into<String>, room_name: impl Into<String>) -> Self {
        let pseudo = pseudo.into();
        Self::JoinRoom {
            room_name: room_name.into(),
            my_pseudo: pseudo.clone(),
            pseudo,
        }
    }
}

// =============================================================================
// Server Messages (server → client)
// =============================================================================

/// Events delivered by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Acknowledgement of the most recent join request. The payload is
    /// opaque to this client and handed back to the caller as-is.
    #[serde(rename = "chat-joined-room")]
    RoomJoined {
        #[serde(flatten)]
        ack: serde_json::Map<String, Value>,
    },
    /// An inbound chat message, optionally scoped to a room.
    #[serde(rename = "chat-msg")]
    Chat {
        #[serde(flatten)]
        message: ChatMessage,
    },
    /// Forward compatibility: event types this client does not know.
    #[serde(other)]
    Unknown,
}
