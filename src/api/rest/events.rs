use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde_json::json;
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", post(ingest_event))
}

/// Ingress for the push channel: one raw event per request. Malformed
/// payloads are counted, logged and rejected; they never reach a tracker.
async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    match state.backend.publish_raw(raw).await {
        Ok(event) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "accepted": event.kind(),
                "order_id": event.order_id(),
            })),
        )),
        Err(err) => {
            if matches!(err, AppError::MalformedEvent(_)) {
                state
                    .metrics
                    .events_total
                    .with_label_values(&["unknown", "malformed"])
                    .inc();
                warn!(error = %err, "malformed event discarded");
            }
            Err(err)
        }
    }
}
