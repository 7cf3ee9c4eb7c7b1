use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub events_total: IntCounterVec,
    pub event_apply_latency_seconds: HistogramVec,
    pub active_trackers: IntGauge,
    pub resyncs_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new("events_total", "Realtime events by type and apply outcome"),
            &["type", "outcome"],
        )
        .expect("valid events_total metric");

        let event_apply_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "event_apply_latency_seconds",
                "Latency of applying one realtime event in seconds",
            ),
            &["outcome"],
        )
        .expect("valid event_apply_latency_seconds metric");

        let active_trackers = IntGauge::new("active_trackers", "Currently open order trackers")
            .expect("valid active_trackers metric");

        let resyncs_total = IntCounterVec::new(
            Opts::new("resyncs_total", "Resynchronization pulls by outcome"),
            &["outcome"],
        )
        .expect("valid resyncs_total metric");

        registry
            .register(Box::new(events_total.clone()))
            .expect("register events_total");
        registry
            .register(Box::new(event_apply_latency_seconds.clone()))
            .expect("register event_apply_latency_seconds");
        registry
            .register(Box::new(active_trackers.clone()))
            .expect("register active_trackers");
        registry
            .register(Box::new(resyncs_total.clone()))
            .expect("register resyncs_total");

        Self {
            registry,
            events_total,
            event_apply_latency_seconds,
            active_trackers,
            resyncs_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
