use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::engine::ledger::StatusLedger;
use crate::engine::reconciler::{Reconciler, ReconcilerSettings};
use crate::error::AppError;
use crate::models::snapshot::TrackingSnapshot;
use crate::observability::metrics::Metrics;
use crate::remote::{EventChannel, QueryApi, SubscriptionId};

/// Everything a tracker needs from the hosting application.
#[derive(Clone)]
pub struct TrackerContext {
    pub channel: Arc<dyn EventChannel>,
    pub query: Arc<dyn QueryApi>,
    pub ledger: Arc<StatusLedger>,
    pub metrics: Metrics,
    pub settings: ReconcilerSettings,
    pub event_buffer_size: usize,
}

/// Live view of one order. Opening a tracker seeds local state with one pull
/// from the remote store, subscribes to the push channel and spawns the
/// reconciler; closing it unsubscribes and tears the reconciler down, which
/// also discards any in-flight resynchronization.
pub struct OrderTracker {
    order_id: Uuid,
    snapshot_rx: watch::Receiver<TrackingSnapshot>,
    subscription: SubscriptionId,
    channel: Arc<dyn EventChannel>,
    metrics: Metrics,
    task: JoinHandle<()>,
}

impl OrderTracker {
    pub async fn open(
        order_id: Uuid,
        viewer: Uuid,
        context: &TrackerContext,
    ) -> Result<Self, AppError> {
        let order = context.query.get_order(order_id).await?;

        let (mut reconciler, snapshot_rx) = Reconciler::new(
            order,
            viewer,
            context.ledger.clone(),
            context.query.clone(),
            context.metrics.clone(),
            context.settings.clone(),
        );

        // initial pull: latest position, unread count, remote head status
        reconciler.resync().await?;
        reconciler.publish_snapshot();

        let (events_tx, events_rx) = tokio::sync::mpsc::channel(context.event_buffer_size);
        let subscription = context.channel.subscribe(order_id, events_tx).await?;
        let task = tokio::spawn(reconciler.run(events_rx));

        context.metrics.active_trackers.inc();

        Ok(Self {
            order_id,
            snapshot_rx,
            subscription,
            channel: context.channel.clone(),
            metrics: context.metrics.clone(),
            task,
        })
    }

    /// Current snapshot. Cheap; the reconciler pushes recomputed values into
    /// the watch channel, nothing is polled here.
    pub fn snapshot(&self) -> TrackingSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver for push-based consumers such as the websocket feed.
    pub fn watch(&self) -> watch::Receiver<TrackingSnapshot> {
        self.snapshot_rx.clone()
    }

    pub async fn close(self) {
        if let Err(err) = self.channel.unsubscribe(self.subscription).await {
            warn!(order_id = %self.order_id, error = %err, "failed to unsubscribe tracker");
        }
        // Drop aborts the reconciler task
    }
}

impl Drop for OrderTracker {
    fn drop(&mut self) {
        self.task.abort();
        self.metrics.active_trackers.dec();
    }
}
