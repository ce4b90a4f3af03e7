use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::rider::RiderStats;
use crate::state::AppState;

/// Queues a rider for recomputation. Dropping the job when the queue is
/// closed only delays the next recompute, so it is logged and ignored.
pub async fn enqueue_stats_recompute(state: &Arc<AppState>, rider_id: Uuid) {
    if state.stats_tx.send(rider_id).await.is_err() {
        warn!(rider_id = %rider_id, "stats queue closed; recompute skipped");
        return;
    }
    state.metrics.stats_jobs_in_queue.inc();
}

/// Background task: drains the queue and overwrites each rider's stats
/// block from the full set of that rider's deliveries.
pub async fn run_stats_aggregator(state: Arc<AppState>, mut stats_rx: mpsc::Receiver<Uuid>) {
    info!("stats aggregator started");

    while let Some(rider_id) = stats_rx.recv().await {
        state.metrics.stats_jobs_in_queue.dec();

        let deliveries: Vec<Delivery> = state
            .deliveries
            .iter()
            .filter(|entry| entry.value().assigned_rider() == Some(rider_id))
            .map(|entry| entry.value().clone())
            .collect();

        let Some(mut rider) = state.riders.get_mut(&rider_id) else {
            debug!(rider_id = %rider_id, "rider vanished before stats recompute");
            continue;
        };

        let rating = rider.stats.rating;
        rider.stats = recompute(rating, &deliveries);
        rider.updated_at = Utc::now();
    }

    warn!("stats aggregator stopped: queue channel closed");
}

/// Pure recomputation of the historical counters from delivery records.
/// The running rating is carried over; it is maintained by the review
/// pipeline, not by this aggregator.
pub fn recompute(rating: f64, deliveries: &[Delivery]) -> RiderStats {
    let mut stats = RiderStats {
        rating,
        ..RiderStats::default()
    };

    let mut delivery_minutes_sum = 0.0;
    let mut delivery_minutes_count = 0u64;

    for delivery in deliveries {
        stats.total_deliveries += 1;

        match delivery.status {
            DeliveryStatus::Cancelled => stats.cancelled_deliveries += 1,
            DeliveryStatus::Delivered => {
                stats.completed_deliveries += 1;
                stats.total_earnings += delivery.fees.rider_payment;
                stats.total_distance_km +=
                    haversine_km(&delivery.pickup.location, &delivery.dropoff.location);

                if let (Some(actual), Some(estimated)) =
                    (delivery.actual_delivery_at, delivery.estimated_delivery_at)
                {
                    if actual <= estimated {
                        stats.on_time_deliveries += 1;
                    } else {
                        stats.late_deliveries += 1;
                    }
                }

                if let (Some(picked), Some(delivered)) =
                    (delivery.actual_pickup_at, delivery.actual_delivery_at)
                {
                    let minutes = (delivered - picked).num_seconds() as f64 / 60.0;
                    if minutes >= 0.0 {
                        delivery_minutes_sum += minutes;
                        delivery_minutes_count += 1;
                    }
                }
            }
            _ => {}
        }
    }

    if delivery_minutes_count > 0 {
        stats.average_delivery_time_minutes =
            delivery_minutes_sum / delivery_minutes_count as f64;
    }

    stats
}
