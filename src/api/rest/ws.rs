use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::snapshot::TrackingSnapshot;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(order_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let snapshots = state
        .trackers
        .get(&order_id)
        .map(|tracker| tracker.watch())
        .ok_or_else(|| AppError::NotFound(format!("no open tracker for order {}", order_id)))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, snapshots)))
}

async fn handle_socket(socket: WebSocket, snapshots: watch::Receiver<TrackingSnapshot>) {
    let (mut sender, mut receiver) = socket.split();
    let mut stream = WatchStream::new(snapshots);

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(snapshot) = stream.next().await {
            let json = match serde_json::to_string(&snapshot) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize snapshot for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
