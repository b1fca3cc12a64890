//! Per-room view state: the ordered message list and the compose box.
//!
//! A view owns nothing below the [`ChatPort`] seam. Mounting joins the room,
//! drains the buffered backlog, then subscribes for live messages; the
//! overlap between the two paths is collapsed by message id. Outbound
//! messages appear immediately as optimistic entries and are reconciled in
//! place when the server echoes them back.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use causette_protocol::{categories, LocationPayload, IMAGE_LINK_MARKER};

use crate::classify::{classify, classify_now, DisplayMessage, Sender};
use crate::error::ClientError;
use crate::http::ImageUpload;
use crate::lock;
use crate::port::ChatPort;
use crate::rooms::Subscription;

#[derive(Default, Clone)]
struct Compose {
    draft: String,
    /// Staged image as a data URI, uploaded on send.
    attachment: Option<String>,
}

impl Compose {
    fn is_empty(&self) -> bool {
        self.draft.trim().is_empty() && self.attachment.is_none()
    }
}

pub struct RoomView {
    room_name: String,
    pseudo: String,
    port: Arc<dyn ChatPort>,
    uploader: Arc<dyn ImageUpload>,
    messages: Arc<Mutex<Vec<DisplayMessage>>>,
    compose: Mutex<Compose>,
    _subscription: Subscription,
}

impl RoomView {
    /// Join the room and wire the message pipeline.
    ///
    /// A failed join is not fatal: the view still drains and subscribes, so
    /// any messages the server sends regardless are shown. The join error is
    /// logged and the next send may surface the real problem.
    pub async fn mount(
        port: Arc<dyn ChatPort>,
        uploader: Arc<dyn ImageUpload>,
        pseudo: impl Into<String>,
        room_name: impl Into<String>,
    ) -> Self {
        let pseudo = pseudo.into();
        let room_name = room_name.into();

        if let Err(e) = port.join_room(&pseudo, &room_name).await {
            tracing::warn!(room = %room_name, "joining failed, continuing unjoined: {e}");
        }

        let messages = Arc::new(Mutex::new(Vec::new()));
        {
            let now = Utc::now();
            let mut list = lock(&messages);
            for raw in port.buffered_messages(&room_name) {
                reconcile(&mut list, classify(&raw, Some(&pseudo), now));
            }
        }

        let live = Arc::clone(&messages);
        let local_pseudo = pseudo.clone();
        let subscription = port.subscribe_messages(
            &room_name,
            Box::new(move |raw| {
                let incoming = classify_now(&raw, Some(&local_pseudo));
                reconcile(&mut lock(&live), incoming);
            }),
        );

        Self {
            room_name,
            pseudo,
            port,
            uploader,
            messages,
            compose: Mutex::new(Compose::default()),
            _subscription: subscription,
        }
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    /// Snapshot of the message list in display order.
    pub fn messages(&self) -> Vec<DisplayMessage> {
        lock(&self.messages).clone()
    }

    pub fn set_draft(&self, draft: impl Into<String>) {
        lock(&self.compose).draft = draft.into();
    }

    pub fn draft(&self) -> String {
        lock(&self.compose).draft.clone()
    }

    /// Stage an image (as a data URI) to be uploaded on the next send.
    pub fn stage_attachment(&self, data_uri: impl Into<String>) {
        lock(&self.compose).attachment = Some(data_uri.into());
    }

    pub fn attachment_preview(&self) -> Option<String> {
        lock(&self.compose).attachment.clone()
    }

    /// Send the composed message.
    ///
    /// A staged image is uploaded first; if the upload fails the compose box
    /// is left untouched and nothing is emitted. Once the content is final it
    /// is shown optimistically, and the network emit is fire-and-forget.
    pub async fn send(&self) -> Result<(), ClientError> {
        let compose = lock(&self.compose).clone();
        if compose.is_empty() {
            return Ok(());
        }

        let (content, text, attachment, categorie) = match compose.attachment {
            Some(data_uri) => {
                let upload_id = Uuid::new_v4().to_string();
                let url = self.uploader.upload_image(&upload_id, &data_uri).await?;
                (
                    format!("{IMAGE_LINK_MARKER} {url}"),
                    String::new(),
                    Some(url),
                    Some(categories::NEW_IMAGE.to_string()),
                )
            }
            None => (compose.draft.clone(), compose.draft.clone(), None, None),
        };

        self.push_optimistic(text, attachment, categorie.clone());
        self.emit(&content, categorie.as_deref()).await;

        *lock(&self.compose) = Compose::default();
        Ok(())
    }

    /// Share a position as a structured location message.
    pub async fn send_location(&self, lat: f64, lng: f64) -> Result<(), ClientError> {
        let payload = LocationPayload::new(lat, lng);
        let content = serde_json::to_string(&payload)
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;

        self.push_optimistic(
            format!("{lat},{lng}"),
            None,
            Some(categories::LOCATION.to_string()),
        );
        self.emit(&content, Some(categories::LOCATION)).await;
        Ok(())
    }

    fn push_optimistic(
        &self,
        text: String,
        attachment: Option<String>,
        categorie: Option<String>,
    ) {
        let entry = DisplayMessage {
            id: Uuid::new_v4().to_string(),
            text,
            attachment,
            sender: Sender::Me,
            pseudo: Some(self.pseudo.clone()),
            categorie,
            timestamp: Utc::now().format("%H:%M").to_string(),
            optimistic: true,
        };
        lock(&self.messages).push(entry);
    }

    /// Emit on the port. Failures are logged, not surfaced: the optimistic
    /// entry stays and the transport reconnects on its own.
    async fn emit(&self, content: &str, categorie: Option<&str>) {
        if let Err(e) = self
            .port
            .send_message(content, &self.room_name, categorie)
            .await
        {
            tracing::warn!(room = %self.room_name, "message emit failed: {e}");
        }
    }

    #[cfg(test)]
    fn messages_handle(&self) -> Arc<Mutex<Vec<DisplayMessage>>> {
        Arc::clone(&self.messages)
    }
}

/// Merge one classified message into the ordered list.
///
/// An echo of our own optimistic entry (same text and attachment) replaces
/// it in place, keeping its position. Otherwise an entry with the same id is
/// a redelivery and is dropped, except that a `Me` classification upgrades
/// an earlier `Other` one. Everything else appends.
pub(crate) fn reconcile(messages: &mut Vec<DisplayMessage>, incoming: DisplayMessage) {
    if incoming.sender == Sender::Me && !incoming.optimistic {
        if let Some(existing) = messages.iter_mut().find(|m| {
            m.optimistic
                && m.sender == Sender::Me
                && m.text == incoming.text
                && m.attachment == incoming.attachment
        }) {
            *existing = incoming;
            return;
        }
    }
    if let Some(existing) = messages.iter_mut().find(|m| m.id == incoming.id) {
        if existing.sender == Sender::Other && incoming.sender == Sender::Me {
            *existing = incoming;
        }
        return;
    }
    messages.push(incoming);
}
