use prometheus::{
    Encoder, GaugeVec, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub stats_jobs_in_queue: IntGauge,
    pub assignment_latency_seconds: HistogramVec,
    pub rider_active_orders: GaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let stats_jobs_in_queue = IntGauge::new(
            "stats_jobs_in_queue",
            "Rider stats recompute jobs currently queued",
        )
        .expect("valid stats_jobs_in_queue metric");

        let assignment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of assignment processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let rider_active_orders = GaugeVec::new(
            Opts::new("rider_active_orders", "Concurrent active orders per rider"),
            &["rider_id"],
        )
        .expect("valid rider_active_orders metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(stats_jobs_in_queue.clone()))
            .expect("register stats_jobs_in_queue");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(rider_active_orders.clone()))
            .expect("register rider_active_orders");

        Self {
            registry,
            assignments_total,
            stats_jobs_in_queue,
            assignment_latency_seconds,
            rider_active_orders,
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
