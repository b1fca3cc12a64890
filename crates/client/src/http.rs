//! HTTP collaborators: room registry listing and image upload.
//!
//! Both sit on the chat API next to the WebSocket endpoint. Uploads are the
//! only HTTP call on the send path, so they get their own seam for tests.

use async_trait::async_trait;

use causette_protocol::{RoomRegistryResponse, UploadImageRequest, UploadImageResponse};

use crate::error::ClientError;

/// One room as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub name: String,
    pub client_count: u64,
}

/// Uploads an inline image and returns the URL it can be referenced by.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ImageUpload: Send + Sync {
    async fn upload_image(&self, id: &str, data_uri: &str) -> Result<String, ClientError>;
}

/// Client for the chat HTTP API.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the rooms currently known to the server, with occupancy.
    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>, ClientError> {
        let url = format!("{}/rooms", self.base);
        let response = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<RoomRegistryResponse>()
            .await?;

        if !response.success {
            return Err(ClientError::Api("room registry returned success=false".into()));
        }

        let mut rooms: Vec<RoomInfo> = response
            .data
            .into_iter()
            .map(|(name, entry)| RoomInfo {
                name,
                client_count: entry.clients.len() as u64,
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    /// The canonical URL for an uploaded image id.
    pub fn image_url(&self, id: &str) -> String {
        format!("{}/api/images/{id}", self.base)
    }
}

#[async_trait]
impl ImageUpload for ApiClient {
    async fn upload_image(&self, id: &str, data_uri: &str) -> Result<String, ClientError> {
        let url = format!("{}/upload", self.base);
        let body = UploadImageRequest {
            id: id.to_string(),
            image_data: data_uri.to_string(),
        };
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Upload(format!(
                "upload rejected with status {}",
                response.status()
            )));
        }

        let payload = response
            .json::<UploadImageResponse>()
            .await
            .map_err(|e| ClientError::Upload(e.to_string()))?;
        if !payload.success {
            return Err(ClientError::Upload("server refused the image".into()));
        }
        Ok(payload
            .location()
            .map(str::to_string)
            .unwrap_or_else(|| self.image_url(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_url_is_rooted_at_the_api_base() {
        let api = ApiClient::new("https://api.example.test/");
        assert_eq!(
            api.image_url("abc-123"),
            "https://api.example.test/api/images/abc-123"
        );
    }

    #[tokio::test]
    async fn list_rooms_fails_on_unreachable_server() {
        let api = ApiClient::new("http://127.0.0.1:1");
        assert!(matches!(api.list_rooms().await, Err(ClientError::Http(_))));
    }
}
