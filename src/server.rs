// src/server.rs
//
// HTTP surface: `/ws` for the persistent alert stream, `/health` for a
// static liveness check. Inbound WebSocket traffic is only used to keep the
// connection alive; a close or send failure deregisters the subscriber.

use crate::registry::SubscriberRegistry;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub fn router(registry: Arc<SubscriberRegistry>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<SubscriberRegistry>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: Arc<SubscriberRegistry>) {
    let id = Uuid::new_v4();
    info!("WebSocket client connected: {}", id);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    registry.add(id, tx);

    let (mut sender, mut receiver) = socket.split();

    // Forward broadcast payloads to this client until the channel or the
    // socket closes.
    let mut send_task = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            if let Err(e) = sender.send(Message::Text(json)).await {
                warn!("Failed to send to WebSocket client: {}", e);
                break;
            }
        }
    });

    // Drain inbound messages; clients only send keep-alives.
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.remove(id);
    debug!("WebSocket client disconnected: {}", id);
}
