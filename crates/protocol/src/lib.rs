//! Causette Protocol - wire types shared with the chat server
//!
//! This crate contains everything that crosses the network boundary:
//! - Realtime event envelopes (`ClientMessage`, `ServerMessage`)
//! - The raw `ChatMessage` wire form and its content markers
//! - HTTP DTOs for the room registry and image store
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - only serde and serde_json
//! 2. **No business logic** - pure data types and serialization
//! 3. **Lossless** - unrecognized payload fields are preserved, not dropped

pub mod dto;
pub mod messages;

pub use dto::{RoomEntry, RoomRegistryResponse, UploadImageRequest, UploadImageResponse};
pub use messages::{
    categories, ChatMessage, ClientMessage, LocationPayload, LocationTag, ServerMessage,
    IMAGE_LINK_MARKER, INLINE_IMAGE_PREFIX,
};
