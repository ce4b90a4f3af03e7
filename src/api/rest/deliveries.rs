use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::assignment::release_rider_slot;
use crate::engine::stats::enqueue_stats_recompute;
use crate::error::AppError;
use crate::models::assignment::AssignmentConfig;
use crate::models::delivery::{
    DEFAULT_RIDER_SHARE, Delivery, DeliveryStatus, DropoffPoint, FeeBreakdown, PickupPoint,
    generate_tracking_code,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/status", patch(update_delivery_status))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub order_id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub pickup: PickupPoint,
    pub dropoff: DropoffPoint,
    pub delivery_fee: f64,
    pub assignment_config: Option<AssignmentConfig>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub note: String,
    pub actor: String,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<Delivery>, AppError> {
    if payload.delivery_fee <= 0.0 {
        return Err(AppError::BadRequest(
            "delivery_fee must be positive".to_string(),
        ));
    }
    let config = payload.assignment_config.unwrap_or_default();
    config.validate()?;

    let now = Utc::now();
    let tracking_code = generate_tracking_code();
    let tracking_url = format!("{}/{tracking_code}", state.tracking_url_base);

    let mut delivery = Delivery {
        id: Uuid::new_v4(),
        order_id: payload.order_id,
        store_id: payload.store_id,
        customer_id: payload.customer_id,
        tracking_code: Some(tracking_code),
        tracking_url: Some(tracking_url),
        rider_id: None,
        external_rider_id: None,
        rider_type: None,
        rider_snapshot: None,
        pickup: payload.pickup,
        dropoff: payload.dropoff,
        fees: FeeBreakdown::split(payload.delivery_fee, DEFAULT_RIDER_SHARE),
        estimated_pickup_at: None,
        actual_pickup_at: None,
        estimated_delivery_at: None,
        actual_delivery_at: None,
        status: DeliveryStatus::Pending,
        status_history: Vec::new(),
        assignment_config: config,
        created_at: now,
        updated_at: now,
    };
    delivery.push_status(DeliveryStatus::Pending, "delivery created", "system");

    state.deliveries.insert(delivery.id, delivery.clone());
    Ok(Json(delivery))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = state
        .deliveries
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    Ok(Json(delivery.value().clone()))
}

async fn list_deliveries(State(state): State<Arc<AppState>>) -> Json<Vec<Delivery>> {
    let deliveries = state
        .deliveries
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(deliveries)
}

/// Forward-only transition with a history entry. Leaving the active states
/// frees the rider's concurrent-order slot and queues a stats recompute.
async fn update_delivery_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Delivery>, AppError> {
    let (updated, released_rider) = {
        let mut entry = state
            .deliveries
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;
        let delivery = entry.value_mut();

        // `assigned` always carries a rider; only the assignment and
        // reassignment endpoints may set it.
        if payload.status == DeliveryStatus::Assigned {
            return Err(AppError::BadRequest(format!(
                "delivery {id} cannot be moved to assigned via status update; use the assignment endpoints"
            )));
        }

        if !delivery.status.can_transition_to(payload.status) {
            return Err(AppError::Conflict(format!(
                "cannot transition delivery {id} from {:?} to {:?}",
                delivery.status, payload.status
            )));
        }

        let was_active = delivery.status.is_active();
        let now = Utc::now();
        match payload.status {
            DeliveryStatus::PickedUp => delivery.actual_pickup_at = Some(now),
            DeliveryStatus::Delivered => delivery.actual_delivery_at = Some(now),
            _ => {}
        }
        delivery.push_status(payload.status, &payload.note, &payload.actor);

        let released = if was_active && !payload.status.is_active() {
            delivery.assigned_rider()
        } else {
            None
        };
        (delivery.clone(), released)
    };

    if let Some(rider_id) = released_rider {
        release_rider_slot(&state, rider_id);
        enqueue_stats_recompute(&state, rider_id).await;
    }

    Ok(Json(updated))
}
