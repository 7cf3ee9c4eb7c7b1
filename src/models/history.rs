use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{GeoPoint, OrderStatus};

/// One immutable record of a status transition. Entries are never mutated
/// or deleted once appended; `sequence` is strictly increasing per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub order_id: Uuid,
    pub sequence: u64,
    /// `None` on the first entry for an order.
    pub old_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub actor_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
    pub geo_tag: Option<GeoPoint>,
}
