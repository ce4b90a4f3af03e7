use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::models::assignment::AssignmentEvent;
use crate::models::delivery::Delivery;
use crate::models::rider::Rider;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub riders: DashMap<Uuid, Rider>,
    pub deliveries: DashMap<Uuid, Delivery>,
    /// Rider ids queued for an async stats recompute.
    pub stats_tx: mpsc::Sender<Uuid>,
    pub assignment_events_tx: broadcast::Sender<AssignmentEvent>,
    pub metrics: Metrics,
    pub tracking_url_base: String,
}

impl AppState {
    pub fn new(
        stats_queue_size: usize,
        event_buffer_size: usize,
        tracking_url_base: String,
    ) -> (Self, mpsc::Receiver<Uuid>) {
        let (stats_tx, stats_rx) = mpsc::channel(stats_queue_size);
        let (assignment_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                riders: DashMap::new(),
                deliveries: DashMap::new(),
                stats_tx,
                assignment_events_tx,
                metrics: Metrics::new(),
                tracking_url_base,
            },
            stats_rx,
        )
    }
}
