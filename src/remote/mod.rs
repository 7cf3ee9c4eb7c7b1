pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::engine::events::RealtimeEvent;
use crate::error::AppError;
use crate::models::order::Order;
use crate::models::position::PositionSample;

pub type SubscriptionId = Uuid;

/// Push channel delivering realtime events per order. Delivery is
/// at-least-once and not strictly ordered across reconnects; consumers are
/// expected to deduplicate and reorder.
#[async_trait]
pub trait EventChannel: Send + Sync {
    async fn subscribe(
        &self,
        order_id: Uuid,
        sink: mpsc::Sender<RealtimeEvent>,
    ) -> Result<SubscriptionId, AppError>;

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), AppError>;
}

/// Request/response capability over the remote store. Used only at tracker
/// open and during resynchronization; all durable state lives behind it.
#[async_trait]
pub trait QueryApi: Send + Sync {
    async fn get_order(&self, order_id: Uuid) -> Result<Order, AppError>;

    async fn get_latest_position(
        &self,
        order_id: Uuid,
    ) -> Result<Option<PositionSample>, AppError>;

    async fn get_unread_count(&self, order_id: Uuid, user_id: Uuid) -> Result<usize, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Driver,
    Admin,
}

/// Read-only view of the authenticated session, injected rather than read
/// from ambient globals.
pub trait AuthSession: Send + Sync {
    fn current_user_id(&self) -> Uuid;
    fn current_user_role(&self) -> UserRole;
}

/// Fixed identity for a single-user process; tests and the demo binary pin
/// the viewer with this.
pub struct StaticSession {
    user_id: Uuid,
    role: UserRole,
}

impl StaticSession {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }
}

impl AuthSession for StaticSession {
    fn current_user_id(&self) -> Uuid {
        self.user_id
    }

    fn current_user_role(&self) -> UserRole {
        self.role
    }
}
