use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::GeoPoint;

/// One driver location ping. Only the most recent sample per order is kept
/// in working memory; ordering is by `captured_at`, not arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSample {
    pub order_id: Uuid,
    pub driver_id: Uuid,
    pub location: GeoPoint,
    pub captured_at: DateTime<Utc>,
}
