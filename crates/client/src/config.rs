//! Client configuration.
//!
//! Defaults point at the production deployment; every field can be
//! overridden from the environment, which is how the binary is configured.

use std::time::Duration;

use serde::Deserialize;

/// Room used for messages that arrive without a `roomName`.
pub const DEFAULT_ROOM: &str = "general";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Realtime endpoint (WebSocket).
    pub server_url: String,
    /// Base URL of the HTTP collaborators (room registry, image store).
    pub api_url: String,
    /// Room messages fall back to when the server omits `roomName`.
    pub default_room: String,
    /// Join handshake deadline in milliseconds.
    pub join_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "wss://api.tools.gavago.fr/socket.io".into(),
            api_url: "https://api.tools.gavago.fr".into(),
            default_room: DEFAULT_ROOM.into(),
            join_timeout_ms: 15_000,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `CAUSETTE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("CAUSETTE_SERVER_URL") {
            config.server_url = url;
        }
        if let Ok(url) = std::env::var("CAUSETTE_API_URL") {
            config.api_url = url;
        }
        if let Ok(room) = std::env::var("CAUSETTE_DEFAULT_ROOM") {
            config.default_room = room;
        }
        if let Ok(ms) = std::env::var("CAUSETTE_JOIN_TIMEOUT_MS") {
            match ms.parse() {
                Ok(parsed) => config.join_timeout_ms = parsed,
                Err(_) => tracing::warn!(value = %ms, "ignoring invalid CAUSETTE_JOIN_TIMEOUT_MS"),
            }
        }
        config
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.default_room, "general");
        assert_eq!(config.join_timeout(), Duration::from_secs(15));
        assert!(config.server_url.starts_with("wss://"));
    }

    #[test]
    fn deserializes_partial_overrides() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"join_timeout_ms": 500}"#).unwrap();
        assert_eq!(config.join_timeout(), Duration::from_millis(500));
        assert_eq!(config.default_room, "general");
    }
}
