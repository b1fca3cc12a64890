//! Wire DTOs for the HTTP collaborators (room registry, image store).
//!
//! These endpoints are owned by the server; the shapes below mirror what it
//! actually returns, success flag included.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /rooms` response: `{ success, data: { "<roomName>": { clients: {…} } } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomRegistryResponse {
    pub success: bool,
    #[serde(default)]
    pub data: HashMap<String, RoomEntry>,
}

/// One room in the registry; `clients` is keyed by connection id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomEntry {
    #[serde(default)]
    pub clients: HashMap<String, Value>,
}

/// `POST /upload` request body.
#[derive(Debug, Clone, Serialize)]
pub struct UploadImageRequest {
    /// Connection id of the uploader.
    pub id: String,
    /// Image payload as a data URI.
    pub image_data: String,
}

/// `POST /upload` response. Depending on deployment the server answers with
/// either a public `url` or an opaque `data` handle; `location()` picks
/// whichever is present.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadImageResponse {
    pub success: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl UploadImageResponse {
    /// The resolved image location, when the upload succeeded.
    pub fn location(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.url.as_deref().or(self.data.as_deref())
    }
}
