use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::evaluator;
use crate::engine::scoring::ScoringWeights;
use crate::engine::stats::enqueue_stats_recompute;
use crate::error::AppError;
use crate::models::assignment::{
    AssignmentConfig, AssignmentEvent, PriorityMode, RiderCandidate,
};
use crate::models::delivery::{Delivery, DeliveryStatus, RiderSnapshot, generate_tracking_code};
use crate::models::rider::{Rider, RiderStatus, RiderType};
use crate::state::AppState;

/// Result of a committed assignment, echoed back to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AssignmentOutcome {
    pub delivery: Delivery,
    pub winner: RiderCandidate,
    pub pools_searched: Vec<String>,
}

/// Runs the full pipeline for one delivery: policy validation, pool
/// resolution, candidate evaluation and scoring, then a conditional commit.
pub async fn assign_delivery(
    state: &Arc<AppState>,
    delivery_id: Uuid,
    actor: &str,
) -> Result<AssignmentOutcome, AppError> {
    let delivery = state
        .deliveries
        .get(&delivery_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

    if delivery.status != DeliveryStatus::Pending {
        return Err(AppError::Conflict(format!(
            "delivery {delivery_id} is not pending (current status: {:?})",
            delivery.status
        )));
    }

    let config = delivery.assignment_config.clone();
    config.validate()?;

    let weights = ScoringWeights::default();
    let (candidates, pools_searched) = resolve_candidates(state, &delivery, &config, &weights);

    if candidates.is_empty() {
        let searched = pools_searched.join(", ");
        warn!(delivery_id = %delivery_id, pools = %searched, "no candidates survived filtering");
        return Err(AppError::NoCandidates(format!(
            "no eligible riders found in pool(s): {searched}"
        )));
    }

    commit_assignment(state, delivery_id, candidates, pools_searched, actor).await
}

/// Evaluates the pool(s) dictated by the policy and returns ranked
/// candidates plus the human-readable list of pools tried.
fn resolve_candidates(
    state: &Arc<AppState>,
    delivery: &Delivery,
    config: &AssignmentConfig,
    weights: &ScoringWeights,
) -> (Vec<RiderCandidate>, Vec<String>) {
    if config.force_internal {
        return (
            evaluate_pool(state, delivery, config, weights, RiderType::Internal),
            vec!["internal (forced)".to_string()],
        );
    }
    if config.force_external {
        return (
            evaluate_pool(state, delivery, config, weights, RiderType::External),
            vec!["external (forced)".to_string()],
        );
    }

    match config.priority {
        PriorityMode::InternalFirst => {
            let internal = evaluate_pool(state, delivery, config, weights, RiderType::Internal);
            if !internal.is_empty() {
                return (internal, vec!["internal".to_string()]);
            }
            let external = evaluate_pool(state, delivery, config, weights, RiderType::External);
            (
                external,
                vec!["internal".to_string(), "external".to_string()],
            )
        }
        PriorityMode::ExternalFirst => {
            let external = evaluate_pool(state, delivery, config, weights, RiderType::External);
            if !external.is_empty() {
                return (external, vec!["external".to_string()]);
            }
            let internal = evaluate_pool(state, delivery, config, weights, RiderType::Internal);
            (
                internal,
                vec!["external".to_string(), "internal".to_string()],
            )
        }
        PriorityMode::Mixed => {
            let internal = evaluate_pool(state, delivery, config, weights, RiderType::Internal);
            let external = evaluate_pool(state, delivery, config, weights, RiderType::External);
            let blended = blend_shortlist(internal, external, config.internal_percentage);
            (
                blended,
                vec!["internal (mixed)".to_string(), "external (mixed)".to_string()],
            )
        }
    }
}

/// Evaluates every eligible rider of one pool and sorts descending by
/// score. The sort is stable, so equal scores keep insertion order and the
/// first-found candidate wins ties.
fn evaluate_pool(
    state: &Arc<AppState>,
    delivery: &Delivery,
    config: &AssignmentConfig,
    weights: &ScoringWeights,
    pool: RiderType,
) -> Vec<RiderCandidate> {
    let mut candidates: Vec<RiderCandidate> = state
        .riders
        .iter()
        .filter_map(|entry| {
            let rider = entry.value();
            if rider.rider_type != pool || !is_dispatchable(rider) {
                return None;
            }
            evaluator::evaluate(rider, delivery, config, weights)
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

fn is_dispatchable(rider: &Rider) -> bool {
    rider.status == RiderStatus::Active
        && rider.documents_verified
        && rider.is_online
        && rider.is_available
}

/// Mixed-mode shortlist: the slot count follows the larger pool, split by
/// `internal_percentage` (internal slots rounded), leftovers backfilled
/// from whichever pool still has candidates. The global best of the
/// shortlist wins, not necessarily the best of both pools combined.
fn blend_shortlist(
    internal: Vec<RiderCandidate>,
    external: Vec<RiderCandidate>,
    internal_percentage: u8,
) -> Vec<RiderCandidate> {
    let slots = internal.len().max(external.len());
    if slots == 0 {
        return Vec::new();
    }

    let internal_target =
        ((slots as f64) * f64::from(internal_percentage) / 100.0).round() as usize;
    let internal_take = internal_target.min(internal.len());
    let external_take = (slots - internal_take).min(external.len());

    let mut shortlist: Vec<RiderCandidate> = internal
        .into_iter()
        .take(internal_take)
        .chain(external.into_iter().take(external_take))
        .collect();
    shortlist.sort_by(|a, b| b.score.total_cmp(&a.score));
    shortlist
}

/// Walks the ranked list and reserves the first rider whose concurrent-order
/// slot can still be taken. The capacity re-check and increment happen under
/// the rider's map-entry lock, so two racing assignments cannot both claim a
/// rider's last slot.
async fn commit_assignment(
    state: &Arc<AppState>,
    delivery_id: Uuid,
    candidates: Vec<RiderCandidate>,
    pools_searched: Vec<String>,
    actor: &str,
) -> Result<AssignmentOutcome, AppError> {
    for candidate in candidates {
        let Some(snapshot) = try_reserve_rider(state, candidate.rider_id) else {
            continue;
        };

        let delivery = {
            let mut entry = state.deliveries.get_mut(&delivery_id).ok_or_else(|| {
                AppError::NotFound(format!("delivery {delivery_id} disappeared during commit"))
            })?;
            let delivery = entry.value_mut();

            if delivery.status != DeliveryStatus::Pending {
                // Lost a race on the delivery itself; give the slot back.
                release_rider_slot(state, candidate.rider_id);
                return Err(AppError::Conflict(format!(
                    "delivery {delivery_id} was assigned concurrently"
                )));
            }

            match candidate.rider_type {
                RiderType::Internal => delivery.rider_id = Some(candidate.rider_id),
                RiderType::External => delivery.external_rider_id = Some(candidate.rider_id),
            }
            delivery.rider_type = Some(candidate.rider_type);
            delivery.rider_snapshot = Some(snapshot);
            if delivery.tracking_code.is_none() {
                delivery.tracking_code = Some(generate_tracking_code());
            }
            if let Some(code) = &delivery.tracking_code {
                delivery.tracking_url = Some(format!("{}/{code}", state.tracking_url_base));
            }
            let now = Utc::now();
            let pickup_eta = chrono::Duration::minutes(candidate.estimated_time_minutes as i64);
            let dropoff_leg_km =
                crate::geo::haversine_km(&delivery.pickup.location, &delivery.dropoff.location);
            let dropoff_eta =
                chrono::Duration::minutes(evaluator::estimate_minutes(dropoff_leg_km) as i64);
            delivery.estimated_pickup_at = Some(now + pickup_eta);
            delivery.estimated_delivery_at = Some(now + pickup_eta + dropoff_eta);
            delivery.push_status(
                DeliveryStatus::Assigned,
                &format!("assigned to rider {}", candidate.rider_id),
                actor,
            );
            delivery.clone()
        };

        info!(
            delivery_id = %delivery_id,
            rider_id = %candidate.rider_id,
            score = candidate.score,
            distance_km = candidate.distance_km,
            "delivery assigned"
        );

        let event = AssignmentEvent {
            delivery_id,
            rider_id: candidate.rider_id,
            rider_type: candidate.rider_type,
            tracking_code: delivery.tracking_code.clone().unwrap_or_default(),
            score: candidate.score,
            distance_km: candidate.distance_km,
            assigned_at: Utc::now(),
        };
        let _ = state.assignment_events_tx.send(event);

        enqueue_stats_recompute(state, candidate.rider_id).await;

        return Ok(AssignmentOutcome {
            delivery,
            winner: candidate,
            pools_searched,
        });
    }

    let searched = pools_searched.join(", ");
    Err(AppError::NoCandidates(format!(
        "all candidates lost their capacity before commit in pool(s): {searched}"
    )))
}

/// Conditional reservation: re-checks capacity under the entry lock and
/// increments the active-order counter. Returns the contact snapshot on
/// success, None when the slot is gone.
fn try_reserve_rider(state: &Arc<AppState>, rider_id: Uuid) -> Option<RiderSnapshot> {
    let mut rider = state.riders.get_mut(&rider_id)?;
    if !rider.has_capacity() || !is_dispatchable(&rider) {
        return None;
    }
    rider.active_orders += 1;
    rider.updated_at = Utc::now();
    state
        .metrics
        .rider_active_orders
        .with_label_values(&[&rider_id.to_string()])
        .set(f64::from(rider.active_orders));

    Some(RiderSnapshot {
        name: rider.name.clone(),
        phone: rider.phone.clone(),
        vehicle: rider.vehicle.describe(),
    })
}

/// Frees one concurrent-order slot, used when a delivery leaves its active
/// states or when a reassignment moves it to another rider.
pub fn release_rider_slot(state: &Arc<AppState>, rider_id: Uuid) {
    if let Some(mut rider) = state.riders.get_mut(&rider_id) {
        rider.active_orders = rider.active_orders.saturating_sub(1);
        rider.updated_at = Utc::now();
        state
            .metrics
            .rider_active_orders
            .with_label_values(&[&rider_id.to_string()])
            .set(f64::from(rider.active_orders));
    }
}

/// Operator-driven reassignment to a specific rider. No re-evaluation of
/// other candidates; the previous rider's slot is released and the delivery
/// is forced back to `assigned` with the operator's reason on record.
pub async fn reassign_delivery(
    state: &Arc<AppState>,
    delivery_id: Uuid,
    new_rider_id: Uuid,
    reason: &str,
    actor: &str,
) -> Result<Delivery, AppError> {
    let previous = {
        let entry = state
            .deliveries
            .get(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;
        let delivery = entry.value();
        if delivery.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "delivery {delivery_id} is terminal and cannot be reassigned"
            )));
        }
        if delivery.assigned_rider().is_none() {
            return Err(AppError::Conflict(format!(
                "delivery {delivery_id} has no rider to reassign from"
            )));
        }
        delivery.assigned_rider()
    };

    let same_rider = previous == Some(new_rider_id);

    let (new_rider_type, current_snapshot) = {
        let rider = state
            .riders
            .get(&new_rider_id)
            .ok_or_else(|| AppError::NotFound(format!("rider {new_rider_id} not found")))?;
        (
            rider.rider_type,
            RiderSnapshot {
                name: rider.name.clone(),
                phone: rider.phone.clone(),
                vehicle: rider.vehicle.describe(),
            },
        )
    };

    // The rider already holds this delivery's slot when the target is
    // unchanged; reserving again would double-count and fail at capacity.
    let snapshot = if same_rider {
        current_snapshot
    } else {
        try_reserve_rider(state, new_rider_id).ok_or_else(|| {
            AppError::Conflict(format!(
                "rider {new_rider_id} is not dispatchable or has no free capacity"
            ))
        })?
    };

    let updated = {
        let mut entry = state.deliveries.get_mut(&delivery_id).ok_or_else(|| {
            AppError::NotFound(format!("delivery {delivery_id} disappeared during reassign"))
        })?;
        let delivery = entry.value_mut();

        delivery.rider_id = None;
        delivery.external_rider_id = None;
        match new_rider_type {
            RiderType::Internal => delivery.rider_id = Some(new_rider_id),
            RiderType::External => delivery.external_rider_id = Some(new_rider_id),
        }
        delivery.rider_type = Some(new_rider_type);
        delivery.rider_snapshot = Some(snapshot);
        delivery.push_status(
            DeliveryStatus::Assigned,
            &format!("reassigned to rider {new_rider_id}: {reason}"),
            actor,
        );
        delivery.clone()
    };

    if !same_rider {
        if let Some(old_rider) = previous {
            release_rider_slot(state, old_rider);
            enqueue_stats_recompute(state, old_rider).await;
        }
    }
    enqueue_stats_recompute(state, new_rider_id).await;

    info!(
        delivery_id = %delivery_id,
        rider_id = %new_rider_id,
        reason = %reason,
        "delivery reassigned"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::blend_shortlist;
    use crate::models::assignment::RiderCandidate;
    use crate::models::rider::RiderType;

    fn candidate(rider_type: RiderType, score: f64) -> RiderCandidate {
        RiderCandidate {
            rider_id: Uuid::new_v4(),
            rider_type,
            distance_km: 1.0,
            estimated_time_minutes: 7.0,
            rating: 4.0,
            availability_score: 100.0,
            cost: 2.0,
            score,
        }
    }

    fn pool(rider_type: RiderType, scores: &[f64]) -> Vec<RiderCandidate> {
        scores.iter().map(|s| candidate(rider_type, *s)).collect()
    }

    #[test]
    fn eighty_twenty_blend_takes_four_internal_one_external() {
        let internal = pool(RiderType::Internal, &[90.0, 85.0, 80.0, 75.0, 70.0]);
        let external = pool(RiderType::External, &[99.0, 98.0, 97.0, 96.0, 95.0]);

        let shortlist = blend_shortlist(internal, external, 80);
        assert_eq!(shortlist.len(), 5);

        let internal_count = shortlist
            .iter()
            .filter(|c| c.rider_type == RiderType::Internal)
            .count();
        assert_eq!(internal_count, 4);
        // Only the single best external made the cut, even though all five
        // externals outscore every internal.
        assert_eq!(shortlist[0].rider_type, RiderType::External);
        assert!((shortlist[0].score - 99.0).abs() < 1e-9);
    }

    #[test]
    fn blend_backfills_when_internal_pool_is_short() {
        let internal = pool(RiderType::Internal, &[90.0]);
        let external = pool(RiderType::External, &[80.0, 70.0, 60.0]);

        let shortlist = blend_shortlist(internal, external, 80);
        assert_eq!(shortlist.len(), 3);
        assert_eq!(
            shortlist
                .iter()
                .filter(|c| c.rider_type == RiderType::External)
                .count(),
            2
        );
    }

    #[test]
    fn blend_of_empty_pools_is_empty() {
        assert!(blend_shortlist(Vec::new(), Vec::new(), 80).is_empty());
    }

    #[test]
    fn zero_percent_blend_is_external_only() {
        let internal = pool(RiderType::Internal, &[90.0, 85.0]);
        let external = pool(RiderType::External, &[80.0, 70.0]);
        let shortlist = blend_shortlist(internal, external, 0);
        assert!(
            shortlist
                .iter()
                .all(|c| c.rider_type == RiderType::External)
        );
    }
}
