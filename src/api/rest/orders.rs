use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::engine::events::{RealtimeEvent, StatusChangedEvent};
use crate::engine::tracker::OrderTracker;
use crate::engine::transitions;
use crate::error::AppError;
use crate::models::history::StatusHistoryEntry;
use crate::models::order::{GeoPoint, Order, OrderStatus, Waypoint};
use crate::models::snapshot::TrackingSnapshot;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/history", get(get_history))
        .route("/orders/:id/snapshot", get(get_snapshot))
        .route("/orders/:id/status", post(update_status))
        .route("/orders/:id/tracker", axum::routing::delete(close_tracker))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<Uuid>,
    pub pickup: Waypoint,
    pub destination: Waypoint,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub new_status: OrderStatus,
    pub note: Option<String>,
    pub geo_tag: Option<GeoPoint>,
}

/// Registers an order and opens its tracker. The order starts pending; all
/// movement comes in through the realtime channel or the status endpoint.
async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.pickup.address.trim().is_empty() || payload.destination.address.trim().is_empty() {
        return Err(AppError::BadRequest("address cannot be empty".to_string()));
    }

    let order = Order {
        id: Uuid::new_v4(),
        customer_id: payload
            .customer_id
            .unwrap_or_else(|| state.auth.current_user_id()),
        driver_id: None,
        pickup: payload.pickup,
        destination: payload.destination,
        status: OrderStatus::Pending,
        created_at: Utc::now(),
    };

    state.backend.register_order(order.clone());

    let tracker = OrderTracker::open(
        order.id,
        state.auth.current_user_id(),
        &state.tracker_context(),
    )
    .await?;
    state.trackers.insert(order.id, tracker);

    tracing::info!(
        order_id = %order.id,
        viewer_role = ?state.auth.current_user_role(),
        "order registered and tracker opened"
    );

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.query.get_order(id).await?;
    Ok(Json(order))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryEntry>>, AppError> {
    // 404 for orders the store has never seen
    state.query.get_order(id).await?;
    Ok(Json(state.ledger.history(id)))
}

async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingSnapshot>, AppError> {
    let tracker = state
        .trackers
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("no open tracker for order {}", id)))?;

    Ok(Json(tracker.snapshot()))
}

/// Locally-originated transition. Validated synchronously against the
/// ledger head so an illegal request fails before anything mutates; the
/// accepted event then travels the same merge path as remote ones.
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    state.query.get_order(id).await?;

    let head = state.ledger.head_status(id);
    transitions::check(head, payload.new_status)?;

    let event = RealtimeEvent::StatusChanged(StatusChangedEvent {
        order_id: id,
        old_status: Some(head),
        new_status: payload.new_status,
        actor_id: state.auth.current_user_id(),
        driver_id: None,
        origin_seq: None,
        occurred_at: Utc::now(),
        note: payload.note,
        geo_tag: payload.geo_tag,
    });
    state.backend.publish(event).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "order_id": id,
            "new_status": payload.new_status,
        })),
    ))
}

async fn close_tracker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let (_, tracker) = state
        .trackers
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(format!("no open tracker for order {}", id)))?;

    tracker.close().await;
    Ok(StatusCode::NO_CONTENT)
}
