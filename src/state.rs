use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::ledger::StatusLedger;
use crate::engine::reconciler::ReconcilerSettings;
use crate::engine::tracker::{OrderTracker, TrackerContext};
use crate::observability::metrics::Metrics;
use crate::remote::memory::InMemoryBackend;
use crate::remote::{AuthSession, EventChannel, QueryApi, StaticSession, UserRole};

pub struct AppState {
    pub backend: Arc<InMemoryBackend>,
    pub channel: Arc<dyn EventChannel>,
    pub query: Arc<dyn QueryApi>,
    pub auth: Arc<dyn AuthSession>,
    pub ledger: Arc<StatusLedger>,
    pub trackers: DashMap<Uuid, OrderTracker>,
    pub metrics: Metrics,
    settings: ReconcilerSettings,
    event_buffer_size: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let backend = Arc::new(InMemoryBackend::new());

        Self {
            channel: backend.clone(),
            query: backend.clone(),
            auth: Arc::new(StaticSession::new(Uuid::new_v4(), UserRole::Customer)),
            ledger: Arc::new(StatusLedger::new()),
            trackers: DashMap::new(),
            metrics: Metrics::new(),
            settings: ReconcilerSettings::from_config(config),
            event_buffer_size: config.event_buffer_size,
            backend,
        }
    }

    pub fn tracker_context(&self) -> TrackerContext {
        TrackerContext {
            channel: self.channel.clone(),
            query: self.query.clone(),
            ledger: self.ledger.clone(),
            metrics: self.metrics.clone(),
            settings: self.settings.clone(),
            event_buffer_size: self.event_buffer_size,
        }
    }
}
