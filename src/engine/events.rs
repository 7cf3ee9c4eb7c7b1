use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::message::Message;
use crate::models::order::{GeoPoint, OrderStatus};
use crate::models::position::PositionSample;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedEvent {
    pub order_id: Uuid,
    /// Head status as the event source saw it. A mismatch with the local
    /// ledger head marks the event as reconciled out of order.
    pub old_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub actor_id: Uuid,
    pub driver_id: Option<Uuid>,
    /// Per-order monotonically increasing sequence assigned at the origin,
    /// when the source provides one. Used to drop replayed events.
    pub origin_seq: Option<u64>,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
    pub geo_tag: Option<GeoPoint>,
}

/// Everything the push channel can deliver for one order. Delivery is
/// at-least-once and not strictly ordered across reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    StatusChanged(StatusChangedEvent),
    PositionPing(PositionSample),
    MessageInserted { order_id: Uuid, message: Message },
    MessageUpdated { order_id: Uuid, message: Message },
    MessageDeleted { order_id: Uuid, message_id: Uuid },
    ConnectionLost { order_id: Uuid },
    ConnectionRestored { order_id: Uuid },
}

impl RealtimeEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            RealtimeEvent::StatusChanged(event) => event.order_id,
            RealtimeEvent::PositionPing(sample) => sample.order_id,
            RealtimeEvent::MessageInserted { order_id, .. }
            | RealtimeEvent::MessageUpdated { order_id, .. }
            | RealtimeEvent::MessageDeleted { order_id, .. }
            | RealtimeEvent::ConnectionLost { order_id }
            | RealtimeEvent::ConnectionRestored { order_id } => *order_id,
        }
    }

    /// Label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::StatusChanged(_) => "status_changed",
            RealtimeEvent::PositionPing(_) => "position_ping",
            RealtimeEvent::MessageInserted { .. } => "message_inserted",
            RealtimeEvent::MessageUpdated { .. } => "message_updated",
            RealtimeEvent::MessageDeleted { .. } => "message_deleted",
            RealtimeEvent::ConnectionLost { .. } => "connection_lost",
            RealtimeEvent::ConnectionRestored { .. } => "connection_restored",
        }
    }
}

/// Decodes one raw event from the wire. Missing fields, unknown status
/// literals and unknown type tags all come back as `MalformedEvent`; the
/// caller logs and discards, the stream keeps running.
pub fn decode_event(raw: serde_json::Value) -> Result<RealtimeEvent, AppError> {
    serde_json::from_value(raw).map_err(|err| AppError::MalformedEvent(err.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::decode_event;
    use crate::error::AppError;

    #[test]
    fn decodes_a_status_changed_event() {
        let event = decode_event(json!({
            "type": "status_changed",
            "order_id": "7f2c1e9a-40cf-4f55-b9a1-09c6e9e0f1aa",
            "old_status": "pending",
            "new_status": "accepted",
            "actor_id": "9a51f6a5-9c15-4a3e-8c0a-2b7f2f4d6e21",
            "driver_id": null,
            "origin_seq": 1,
            "occurred_at": "2026-03-01T10:15:00Z",
            "note": null,
            "geo_tag": null
        }))
        .unwrap();

        assert_eq!(event.kind(), "status_changed");
    }

    #[test]
    fn missing_order_id_is_malformed() {
        let err = decode_event(json!({
            "type": "connection_lost"
        }))
        .unwrap_err();

        assert!(matches!(err, AppError::MalformedEvent(_)));
    }

    #[test]
    fn unknown_status_literal_is_malformed() {
        let err = decode_event(json!({
            "type": "status_changed",
            "order_id": "7f2c1e9a-40cf-4f55-b9a1-09c6e9e0f1aa",
            "old_status": null,
            "new_status": "teleported",
            "actor_id": "9a51f6a5-9c15-4a3e-8c0a-2b7f2f4d6e21",
            "occurred_at": "2026-03-01T10:15:00Z"
        }))
        .unwrap_err();

        assert!(matches!(err, AppError::MalformedEvent(_)));
    }

    #[test]
    fn unknown_type_tag_is_malformed() {
        let err = decode_event(json!({
            "type": "order_exploded",
            "order_id": "7f2c1e9a-40cf-4f55-b9a1-09c6e9e0f1aa"
        }))
        .unwrap_err();

        assert!(matches!(err, AppError::MalformedEvent(_)));
    }
}
