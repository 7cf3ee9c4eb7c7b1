use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::backoff::Backoff;
use crate::engine::events::{RealtimeEvent, StatusChangedEvent};
use crate::engine::ledger::{StatusLedger, Transition};
use crate::engine::transitions;
use crate::error::AppError;
use crate::geo;
use crate::models::message::Message;
use crate::models::order::{Order, OrderStatus};
use crate::models::position::PositionSample;
use crate::models::snapshot::TrackingSnapshot;
use crate::observability::metrics::Metrics;
use crate::remote::QueryApi;

/// Actor recorded on ledger entries written during resynchronization, where
/// no user initiated the change.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub assumed_speed_kmh: f64,
    pub resync_backoff_start: Duration,
    pub resync_backoff_cap: Duration,
}

impl ReconcilerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            assumed_speed_kmh: config.assumed_speed_kmh,
            resync_backoff_start: Duration::from_millis(config.resync_backoff_start_ms),
            resync_backoff_cap: Duration::from_millis(config.resync_backoff_cap_ms),
        }
    }
}

/// Merges one order's event stream against local state and publishes the
/// resulting snapshot. Owns that order's position cache, message thread and
/// staleness flag; the single-consumer queue feeding `run` serializes every
/// mutation, so there is no locking here.
pub struct Reconciler {
    order: Order,
    viewer: Uuid,
    ledger: Arc<StatusLedger>,
    query: Arc<dyn QueryApi>,
    metrics: Metrics,
    snapshot_tx: watch::Sender<TrackingSnapshot>,
    settings: ReconcilerSettings,
    latest_position: Option<PositionSample>,
    messages: Vec<Message>,
    unread_messages: usize,
    progress_peak: f64,
    last_origin_seq: Option<u64>,
    stale: bool,
}

impl Reconciler {
    pub fn new(
        order: Order,
        viewer: Uuid,
        ledger: Arc<StatusLedger>,
        query: Arc<dyn QueryApi>,
        metrics: Metrics,
        settings: ReconcilerSettings,
    ) -> (Self, watch::Receiver<TrackingSnapshot>) {
        let initial = TrackingSnapshot {
            order: order.clone(),
            latest_position: None,
            eta_minutes: None,
            progress_percent: None,
            unread_messages: 0,
            stale: false,
            updated_at: Utc::now(),
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let reconciler = Self {
            order,
            viewer,
            ledger,
            query,
            metrics,
            snapshot_tx,
            settings,
            latest_position: None,
            messages: Vec::new(),
            unread_messages: 0,
            progress_peak: 0.0,
            last_origin_seq: None,
            stale: false,
        };

        (reconciler, snapshot_rx)
    }

    /// Consumes the order's event queue until it closes. One event at a
    /// time, in arrival order; no two status transitions for this order are
    /// ever validated concurrently.
    pub async fn run(mut self, mut events: mpsc::Receiver<RealtimeEvent>) {
        info!(order_id = %self.order.id, "reconciler started");

        while let Some(event) = events.recv().await {
            let kind = event.kind();
            let start = Instant::now();

            match self.apply(event).await {
                Ok(outcome) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    self.metrics
                        .event_apply_latency_seconds
                        .with_label_values(&["success"])
                        .observe(elapsed);
                    self.metrics
                        .events_total
                        .with_label_values(&[kind, outcome])
                        .inc();

                    self.publish_snapshot();
                }
                Err(err) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    self.metrics
                        .event_apply_latency_seconds
                        .with_label_values(&["error"])
                        .observe(elapsed);
                    self.metrics
                        .events_total
                        .with_label_values(&[kind, "error"])
                        .inc();
                    error!(order_id = %self.order.id, error = %err, "failed to apply event");
                }
            }
        }

        info!(order_id = %self.order.id, "reconciler stopped: event queue closed");
    }

    async fn apply(&mut self, event: RealtimeEvent) -> Result<&'static str, AppError> {
        match event {
            RealtimeEvent::StatusChanged(event) => self.apply_status(event),
            RealtimeEvent::PositionPing(sample) => Ok(self.apply_position(sample)),
            RealtimeEvent::MessageInserted { message, .. } => {
                Ok(self.apply_message_insert(message))
            }
            RealtimeEvent::MessageUpdated { message, .. } => {
                Ok(self.apply_message_update(message))
            }
            RealtimeEvent::MessageDeleted { message_id, .. } => {
                Ok(self.apply_message_delete(message_id))
            }
            RealtimeEvent::ConnectionLost { .. } => Ok(self.apply_connection_lost()),
            RealtimeEvent::ConnectionRestored { .. } => {
                Ok(self.apply_connection_restored().await)
            }
        }
    }

    fn apply_status(&mut self, event: StatusChangedEvent) -> Result<&'static str, AppError> {
        if let (Some(seq), Some(last)) = (event.origin_seq, self.last_origin_seq) {
            if seq <= last {
                debug!(order_id = %self.order.id, origin_seq = seq, "replayed status event dropped");
                return Ok("duplicate");
            }
        }

        let head = self.ledger.head_status(self.order.id);
        if let Some(seq) = event.origin_seq {
            self.last_origin_seq = Some(seq);
        }

        if head == event.new_status {
            return Ok("duplicate");
        }

        let change = Transition {
            new_status: event.new_status,
            actor_id: event.actor_id,
            occurred_at: event.occurred_at,
            note: event.note,
            geo_tag: event.geo_tag,
        };

        let stated_old_matches = event.old_status.is_none_or(|old| old == head);
        let outcome = if stated_old_matches && transitions::is_legal(head, event.new_status) {
            self.ledger.append(self.order.id, change)?;
            "applied"
        } else {
            // The remote source is the system of record; local state is
            // simply behind. Apply anyway, but flag it for observability.
            warn!(
                order_id = %self.order.id,
                stated_old = ?event.old_status,
                local_head = ?head,
                new = ?event.new_status,
                "status reconciled out of order"
            );
            self.ledger.force_append(self.order.id, change);
            "out_of_order"
        };

        if let Some(driver_id) = event.driver_id {
            self.order.driver_id = Some(driver_id);
        }
        self.order.status = self.ledger.head_status(self.order.id);

        Ok(outcome)
    }

    /// Last writer wins by capture time, not arrival order. Every accepted
    /// sample advances the progress high-water mark so the reported progress
    /// never moves backwards on a jittery feed.
    fn apply_position(&mut self, sample: PositionSample) -> &'static str {
        if let Some(cached) = &self.latest_position {
            if sample.captured_at < cached.captured_at {
                debug!(
                    order_id = %self.order.id,
                    captured_at = %sample.captured_at,
                    "stale position ping dropped"
                );
                return "stale_position";
            }
        }

        let progress = geo::progress_percent(
            &self.order.pickup.location,
            &sample.location,
            &self.order.destination.location,
        );
        self.progress_peak = self.progress_peak.max(progress);
        self.latest_position = Some(sample);

        "applied"
    }

    fn recount_unread(&mut self) {
        self.unread_messages = self.messages.iter().filter(|message| !message.read).count();
    }

    fn apply_message_insert(&mut self, message: Message) -> &'static str {
        if self.messages.iter().any(|existing| existing.id == message.id) {
            return "duplicate";
        }

        self.messages.push(message);
        self.recount_unread();
        "applied"
    }

    /// Upsert: the channel is not ordered across reconnects, so an update
    /// can outrun its insert.
    fn apply_message_update(&mut self, message: Message) -> &'static str {
        match self
            .messages
            .iter_mut()
            .find(|existing| existing.id == message.id)
        {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }

        self.recount_unread();
        "applied"
    }

    fn apply_message_delete(&mut self, message_id: Uuid) -> &'static str {
        let before = self.messages.len();
        self.messages.retain(|existing| existing.id != message_id);

        if self.messages.len() == before {
            return "duplicate";
        }

        self.recount_unread();
        "applied"
    }

    fn apply_connection_lost(&mut self) -> &'static str {
        if self.stale {
            return "duplicate";
        }

        warn!(
            order_id = %self.order.id,
            error = %AppError::ChannelDisconnected,
            "snapshot marked stale"
        );
        self.stale = true;
        "applied"
    }

    /// One resynchronization pull per lost/restored pair. Retries under
    /// backoff until it succeeds; the stale flag clears only on success.
    async fn apply_connection_restored(&mut self) -> &'static str {
        if !self.stale {
            return "duplicate";
        }

        self.resync_with_backoff().await;
        "applied"
    }

    async fn resync_with_backoff(&mut self) {
        let mut backoff = Backoff::new(
            self.settings.resync_backoff_start,
            self.settings.resync_backoff_cap,
        );

        loop {
            match self.resync().await {
                Ok(()) => {
                    self.metrics
                        .resyncs_total
                        .with_label_values(&["success"])
                        .inc();
                    info!(order_id = %self.order.id, "resynchronized with remote store");
                    return;
                }
                Err(err) => {
                    self.metrics
                        .resyncs_total
                        .with_label_values(&["error"])
                        .inc();
                    let delay = backoff.next_delay();
                    warn!(
                        order_id = %self.order.id,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "resynchronization failed"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Pulls the authoritative current state and repairs the local caches.
    /// Also used as the initial seed when a tracker opens.
    pub(crate) async fn resync(&mut self) -> Result<(), AppError> {
        let order = self.query.get_order(self.order.id).await?;
        let position = self.query.get_latest_position(self.order.id).await?;
        let unread = self.query.get_unread_count(self.order.id, self.viewer).await?;

        if self.ledger.head_status(self.order.id) != order.status {
            self.ledger.force_append(
                self.order.id,
                Transition::new(order.status, SYSTEM_ACTOR),
            );
        }
        self.order = order;

        if let Some(sample) = position {
            self.apply_position(sample);
        }
        self.unread_messages = unread;
        self.stale = false;

        Ok(())
    }

    pub(crate) fn publish_snapshot(&self) {
        let _ = self.snapshot_tx.send(self.snapshot());
    }

    fn snapshot(&self) -> TrackingSnapshot {
        let in_transit = self.order.status == OrderStatus::InTransit;

        let eta_minutes = if in_transit {
            geo::eta_minutes(
                self.latest_position.as_ref().map(|sample| &sample.location),
                Some(&self.order.destination.location),
                self.settings.assumed_speed_kmh,
            )
        } else {
            None
        };

        let progress_percent = if in_transit && self.latest_position.is_some() {
            Some(self.progress_peak)
        } else {
            None
        };

        TrackingSnapshot {
            order: self.order.clone(),
            latest_position: self.latest_position.clone(),
            eta_minutes,
            progress_percent,
            unread_messages: self.unread_messages,
            stale: self.stale,
            updated_at: Utc::now(),
        }
    }
}
