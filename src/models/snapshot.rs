use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::order::Order;
use crate::models::position::PositionSample;

/// The derived, in-memory view fed to presentation layers. Recomputed on
/// every accepted event; never persisted.
///
/// `eta_minutes` and `progress_percent` are `None` whenever the order is not
/// in transit (not applicable, rather than a stale number), and while no
/// position sample has been seen yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    pub order: Order,
    pub latest_position: Option<PositionSample>,
    pub eta_minutes: Option<u32>,
    pub progress_percent: Option<f64>,
    pub unread_messages: usize,
    /// Set while the realtime connection is down; the data shown is the last
    /// known-good value until a resynchronization succeeds.
    pub stale: bool,
    pub updated_at: DateTime<Utc>,
}
