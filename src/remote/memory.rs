use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::engine::events::{decode_event, RealtimeEvent};
use crate::error::AppError;
use crate::models::message::Message;
use crate::models::order::Order;
use crate::models::position::PositionSample;
use crate::remote::{EventChannel, QueryApi, SubscriptionId};

struct Subscription {
    order_id: Uuid,
    sink: mpsc::Sender<RealtimeEvent>,
}

/// In-process stand-in for the managed backend: the authoritative order
/// mirror plus a per-order fan-out of realtime events. The binary and the
/// integration tests wire this in; production deployments substitute real
/// channel/query implementations behind the same traits.
pub struct InMemoryBackend {
    orders: DashMap<Uuid, Order>,
    positions: DashMap<Uuid, PositionSample>,
    threads: DashMap<Uuid, Vec<Message>>,
    subscriptions: DashMap<SubscriptionId, Subscription>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            positions: DashMap::new(),
            threads: DashMap::new(),
            subscriptions: DashMap::new(),
        }
    }

    pub fn register_order(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Decodes one raw event from the wire and publishes it.
    pub async fn publish_raw(&self, raw: serde_json::Value) -> Result<RealtimeEvent, AppError> {
        let event = decode_event(raw)?;
        self.publish(event.clone()).await;
        Ok(event)
    }

    /// Folds the event into the authoritative mirror, then fans it out to
    /// every subscriber of the order. Subscribers whose queue has gone away
    /// are dropped.
    pub async fn publish(&self, event: RealtimeEvent) {
        self.absorb(&event);

        let order_id = event.order_id();
        let sinks: Vec<(SubscriptionId, mpsc::Sender<RealtimeEvent>)> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().order_id == order_id)
            .map(|entry| (*entry.key(), entry.value().sink.clone()))
            .collect();

        for (subscription, sink) in sinks {
            if sink.send(event.clone()).await.is_err() {
                self.subscriptions.remove(&subscription);
            }
        }
    }

    fn absorb(&self, event: &RealtimeEvent) {
        match event {
            RealtimeEvent::StatusChanged(change) => {
                if let Some(mut order) = self.orders.get_mut(&change.order_id) {
                    order.status = change.new_status;
                    if change.driver_id.is_some() {
                        order.driver_id = change.driver_id;
                    }
                }
            }
            RealtimeEvent::PositionPing(sample) => {
                match self.positions.get_mut(&sample.order_id) {
                    Some(mut cached) => {
                        if sample.captured_at >= cached.captured_at {
                            *cached = sample.clone();
                        }
                    }
                    None => {
                        self.positions.insert(sample.order_id, sample.clone());
                    }
                }
            }
            RealtimeEvent::MessageInserted { order_id, message } => {
                let mut thread = self.threads.entry(*order_id).or_default();
                if !thread.iter().any(|existing| existing.id == message.id) {
                    thread.push(message.clone());
                }
            }
            RealtimeEvent::MessageUpdated { order_id, message } => {
                let mut thread = self.threads.entry(*order_id).or_default();
                match thread.iter_mut().find(|existing| existing.id == message.id) {
                    Some(existing) => *existing = message.clone(),
                    None => thread.push(message.clone()),
                }
            }
            RealtimeEvent::MessageDeleted {
                order_id,
                message_id,
            } => {
                if let Some(mut thread) = self.threads.get_mut(order_id) {
                    thread.retain(|existing| existing.id != *message_id);
                }
            }
            RealtimeEvent::ConnectionLost { .. } | RealtimeEvent::ConnectionRestored { .. } => {}
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventChannel for InMemoryBackend {
    async fn subscribe(
        &self,
        order_id: Uuid,
        sink: mpsc::Sender<RealtimeEvent>,
    ) -> Result<SubscriptionId, AppError> {
        let subscription = Uuid::new_v4();
        self.subscriptions
            .insert(subscription, Subscription { order_id, sink });
        Ok(subscription)
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), AppError> {
        self.subscriptions.remove(&subscription);
        Ok(())
    }
}

#[async_trait]
impl QueryApi for InMemoryBackend {
    async fn get_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.orders
            .get(&order_id)
            .map(|order| order.clone())
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))
    }

    async fn get_latest_position(
        &self,
        order_id: Uuid,
    ) -> Result<Option<PositionSample>, AppError> {
        Ok(self.positions.get(&order_id).map(|sample| sample.clone()))
    }

    async fn get_unread_count(&self, order_id: Uuid, user_id: Uuid) -> Result<usize, AppError> {
        let count = self
            .threads
            .get(&order_id)
            .map(|thread| {
                thread
                    .iter()
                    .filter(|message| !message.read && message.receiver_id == user_id)
                    .count()
            })
            .unwrap_or(0);

        Ok(count)
    }
}
