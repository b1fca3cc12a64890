//! Terminal chat client - composition root binary.
//!
//! Usage: `causette <pseudo> [room]`. Lines typed on stdin are sent to the
//! room; `/loc <lat> <lng>` shares a location, `/quit` leaves.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use causette_client::{
    classify::Sender, ApiClient, ChatConnection, ChatPort, ClientConfig, ImageUpload, RoomView,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "causette=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let pseudo = args.next().context("usage: causette <pseudo> [room]")?;
    let config = ClientConfig::from_env();
    let room = args.next().unwrap_or_else(|| config.default_room.clone());

    let api = Arc::new(ApiClient::new(&config.api_url));
    match api.list_rooms().await {
        Ok(rooms) => {
            println!("rooms on {}:", config.api_url);
            for info in rooms {
                let label = causette_client::normalize_room_name(&info.name, 40);
                println!("  {} ({} online)", label.short, info.client_count);
            }
        }
        Err(e) => tracing::warn!("could not list rooms: {e}"),
    }

    let connection = ChatConnection::new(&config);
    let port: Arc<dyn ChatPort> = connection.clone();
    let view = RoomView::mount(
        Arc::clone(&port),
        Arc::clone(&api) as Arc<dyn ImageUpload>,
        pseudo.clone(),
        room.clone(),
    )
    .await;

    // print messages from everyone else as they arrive
    let printer_pseudo = pseudo.clone();
    let _printer = port.subscribe_messages(
        &room,
        Box::new(move |raw| {
            let msg = causette_client::classify_now(&raw, Some(&printer_pseudo));
            if msg.sender == Sender::Me {
                return;
            }
            let who = msg.pseudo.as_deref().unwrap_or("anon");
            match msg.attachment {
                Some(url) => println!("[{}] {who}: <image> {url}", msg.timestamp),
                None => println!("[{}] {who}: {}", msg.timestamp, msg.text),
            }
        }),
    );

    println!("joined '{room}' as {pseudo}; /loc <lat> <lng> shares a location, /quit leaves");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line == "/quit" {
            break;
        }
        if let Some(rest) = line.strip_prefix("/loc ") {
            let mut parts = rest.split_whitespace();
            let coords = (
                parts.next().and_then(|v| v.parse::<f64>().ok()),
                parts.next().and_then(|v| v.parse::<f64>().ok()),
            );
            match coords {
                (Some(lat), Some(lng)) => {
                    if let Err(e) = view.send_location(lat, lng).await {
                        tracing::warn!("location send failed: {e}");
                    }
                }
                _ => println!("usage: /loc <lat> <lng>"),
            }
            continue;
        }
        view.set_draft(line);
        if let Err(e) = view.send().await {
            tracing::warn!("send failed: {e}");
        }
    }

    port.disconnect().await;
    Ok(())
}
