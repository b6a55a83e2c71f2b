//! WebSocket stream of session events

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::ApiState;
use crate::controller::SessionSnapshot;
use crate::session::SessionEvent;

/// Outgoing WebSocket message
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsOutgoing {
    /// Sent once on connect so the page can render without polling
    Snapshot { snapshot: SessionSnapshot },
    /// Events were dropped; the client should refetch `/api/session`
    Resync,
}

/// Build session WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json<T: Serialize>(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    value: &T,
) -> bool {
    match serde_json::to_string(value) {
        Ok(text) => sender.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize websocket message");
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so no event falls in between
    let mut rx = state.controller.subscribe();

    let snapshot = WsOutgoing::Snapshot {
        snapshot: state.controller.snapshot().await,
    };
    if !send_json(&mut sender, &snapshot).await {
        return;
    }

    tracing::info!("session websocket connected");

    let mut forward_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !send_json::<SessionEvent>(&mut sender, &event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session websocket lagged");
                    if !send_json(&mut sender, &WsOutgoing::Resync).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                tracing::info!("session websocket closed by client");
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => recv_task.abort(),
        _ = &mut recv_task => forward_task.abort(),
    }

    tracing::info!("session websocket disconnected");
}
