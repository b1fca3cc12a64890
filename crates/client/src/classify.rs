//! Translates raw wire messages into typed display messages.
//!
//! This is the boundary between the server's loose payloads and the UI's
//! typed model, in the same spirit as a protocol→view-event translator:
//! one pure function, total over its input. Anything that fails to parse is
//! shown as opaque text rather than rejected.

use chrono::{DateTime, Utc};
use serde_json::Value;

use causette_protocol::{
    categories, ChatMessage, LocationPayload, IMAGE_LINK_MARKER, INLINE_IMAGE_PREFIX,
};

/// Who a display message is attributed to, resolved against the local pseudo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Me,
    Other,
}

/// A message ready for presentation.
///
/// Immutable once created; the room view replaces entries wholesale during
/// reconciliation instead of mutating them.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    /// Stable identifier: server-provided when present, otherwise derived
    /// deterministically so redelivery maps to the same id.
    pub id: String,
    pub text: String,
    /// Resolved image URL or inline data URI.
    pub attachment: Option<String>,
    pub sender: Sender,
    pub pseudo: Option<String>,
    pub categorie: Option<String>,
    /// `HH:MM`, locale-independent.
    pub timestamp: String,
    /// True until the server echo confirms this message.
    pub optimistic: bool,
}

/// Classify one wire message. Never fails; deterministic for a given
/// message, local pseudo, and receipt time.
pub fn classify(
    msg: &ChatMessage,
    local_pseudo: Option<&str>,
    received_at: DateTime<Utc>,
) -> DisplayMessage {
    let sender = match (msg.pseudo.as_deref(), local_pseudo) {
        (Some(pseudo), Some(me)) if pseudo == me => Sender::Me,
        _ => Sender::Other,
    };
    let (categorie, text, attachment) = classify_content(msg);
    DisplayMessage {
        id: stable_id(msg, received_at),
        text,
        attachment,
        sender,
        pseudo: msg.pseudo.clone(),
        categorie,
        timestamp: display_time(msg.date_emis.as_deref(), received_at),
        optimistic: false,
    }
}

/// [`classify`] with the receipt time taken now.
pub fn classify_now(msg: &ChatMessage, local_pseudo: Option<&str>) -> DisplayMessage {
    classify(msg, local_pseudo, Utc::now())
}

/// Content interpretation, first match wins:
/// server-tagged image, inline data URI, image-link marker, location
/// payload, then plain text.
fn classify_content(msg: &ChatMessage) -> (Option<String>, String, Option<String>) {
    if msg.categorie.as_deref() == Some(categories::NEW_IMAGE) {
        return (
            Some(categories::NEW_IMAGE.into()),
            String::new(),
            Some(content_text(&msg.content)),
        );
    }
    if let Some(content) = msg.content_str() {
        if content.starts_with(INLINE_IMAGE_PREFIX) {
            return (
                Some(categories::NEW_IMAGE.into()),
                String::new(),
                Some(content.into()),
            );
        }
        if let Some(url) = extract_image_link(content) {
            return (Some(categories::NEW_IMAGE.into()), String::new(), Some(url));
        }
    }
    if let Some(location) = parse_location(&msg.content) {
        return (
            Some(categories::LOCATION.into()),
            format!("{},{}", location.lat, location.lng),
            None,
        );
    }
    (msg.categorie.clone(), content_text(&msg.content), None)
}

/// URL following the image-link marker, if any.
fn extract_image_link(content: &str) -> Option<String> {
    let at = content.find(IMAGE_LINK_MARKER)?;
    let rest = &content[at + IMAGE_LINK_MARKER.len()..];
    rest.split_whitespace().next().map(str::to_string)
}

fn parse_location(content: &Value) -> Option<LocationPayload> {
    match content {
        Value::String(text) => serde_json::from_str(text).ok(),
        Value::Object(_) => serde_json::from_value(content.clone()).ok(),
        _ => None,
    }
}

/// Content as display text; structured payloads are stringified.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Wire id when the server sent one, otherwise
/// `timestamp|pseudo|content-prefix` so redelivery reclassifies identically.
fn stable_id(msg: &ChatMessage, received_at: DateTime<Utc>) -> String {
    if let Some(id) = msg.wire_id() {
        return id;
    }
    let timestamp = msg
        .date_emis
        .clone()
        .unwrap_or_else(|| received_at.to_rfc3339());
    let who = msg.pseudo.as_deref().unwrap_or("anon");
    let prefix: String = content_text(&msg.content).chars().take(32).collect();
    format!("{timestamp}|{who}|{prefix}")
}

fn display_time(date_emis: Option<&str>, received_at: DateTime<Utc>) -> String {
    let emitted = date_emis
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or(received_at);
    emitted.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 7, 0).unwrap()
    }

    fn wire(content: &str) -> ChatMessage {
        ChatMessage::text(content)
    }

    #[test]
    fn image_link_marker_extracts_url() {
        let dm = classify(&wire("[IMAGE] https://x/y.png"), None, at());
        assert_eq!(dm.categorie.as_deref(), Some("NEW_IMAGE"));
        assert_eq!(dm.attachment.as_deref(), Some("https://x/y.png"));
        assert_eq!(dm.text, "");
    }

    #[test]
    fn inline_data_uri_becomes_attachment() {
        let dm = classify(&wire("data:image/png;base64,iVBOR"), None, at());
        assert_eq!(dm.categorie.as_deref(), Some("NEW_IMAGE"));
        assert_eq!(dm.attachment.as_deref(), Some("data:image/png;base64,iVBOR"));
        assert_eq!(dm.text, "");
    }

    #[test]
    fn server_tagged_image_wins_over_content_shape() {
        let mut msg = wire("https://x/raw.png");
        msg.categorie = Some("NEW_IMAGE".into());
        let dm = classify(&msg, None, at());
        assert_eq!(dm.attachment.as_deref(), Some("https://x/raw.png"));
        assert_eq!(dm.text, "");
    }

    #[test]
    fn location_json_renders_lat_lng() {
        let dm = classify(&wire(r#"{"type":"LOCATION","lat":1.5,"lng":2.5}"#), None, at());
        assert_eq!(dm.categorie.as_deref(), Some("LOCATION"));
        assert_eq!(dm.text, "1.5,2.5");
        assert!(dm.attachment.is_none());
    }

    #[test]
    fn structured_location_content_is_recognized() {
        let mut msg = wire("");
        msg.content = serde_json::json!({"type":"LOCATION","lat":-3.0,"lng":40.25});
        let dm = classify(&msg, None, at());
        assert_eq!(dm.categorie.as_deref(), Some("LOCATION"));
        assert_eq!(dm.text, "-3,40.25");
    }

    #[test]
    fn malformed_location_degrades_to_text() {
        let raw = r#"{"type":"LOCATION","lat":"north","lng":2.5}"#;
        let dm = classify(&wire(raw), None, at());
        assert_eq!(dm.categorie, None);
        assert_eq!(dm.text, raw);
    }

    #[test]
    fn plain_text_and_info_categorie_pass_through() {
        let mut msg = wire("bob joined");
        msg.categorie = Some("INFO".into());
        let dm = classify(&msg, None, at());
        assert_eq!(dm.categorie.as_deref(), Some("INFO"));
        assert_eq!(dm.text, "bob joined");
    }

    #[test]
    fn non_string_content_is_stringified() {
        let mut msg = wire("");
        msg.content = serde_json::json!({"a": 1});
        let dm = classify(&msg, None, at());
        assert_eq!(dm.text, r#"{"a":1}"#);
    }

    #[test]
    fn sender_resolution_is_exact_and_case_sensitive() {
        let mut msg = wire("hi");
        msg.pseudo = Some("Alice".into());
        assert_eq!(classify(&msg, Some("Alice"), at()).sender, Sender::Me);
        assert_eq!(classify(&msg, Some("alice"), at()).sender, Sender::Other);
        assert_eq!(classify(&msg, None, at()).sender, Sender::Other);
    }

    #[test]
    fn wire_id_is_preferred() {
        let mut msg = wire("hi");
        msg.extra.insert("id".into(), serde_json::json!("srv-9"));
        assert_eq!(classify(&msg, None, at()).id, "srv-9");
    }

    #[test]
    fn derived_id_is_stable_across_redelivery() {
        let mut msg = wire("the same message body");
        msg.pseudo = Some("bob".into());
        msg.date_emis = Some("2024-05-01T10:06:00Z".into());
        let first = classify(&msg, None, at());
        let second = classify(&msg, None, at());
        assert_eq!(first.id, second.id);
        assert_eq!(first, second);
    }

    #[test]
    fn timestamp_formats_emission_time_as_hh_mm() {
        let mut msg = wire("hi");
        msg.date_emis = Some("2024-05-01T08:03:21Z".into());
        assert_eq!(classify(&msg, None, at()).timestamp, "08:03");
    }

    #[test]
    fn unparseable_date_falls_back_to_receipt_time() {
        let mut msg = wire("hi");
        msg.date_emis = Some("yesterday-ish".into());
        assert_eq!(classify(&msg, None, at()).timestamp, "10:07");
    }
}
