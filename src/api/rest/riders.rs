use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::rider::{
    ExternalProvider, GeoPoint, PaymentTerms, Rider, RiderLocation, RiderStats, RiderStatus,
    RiderType, ServiceArea, VehicleInfo, WorkingHours,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders", post(register_rider).get(list_riders))
        .route("/riders/available", get(list_available_riders))
        .route("/riders/:id/status", patch(update_rider_status))
        .route("/riders/:id/location", patch(update_rider_location))
        .route("/riders/:id/verify", post(verify_rider))
}

#[derive(Deserialize)]
pub struct RegisterRiderRequest {
    pub name: String,
    pub phone: String,
    pub government_id: String,
    pub rider_type: RiderType,
    pub user_id: Option<Uuid>,
    pub vehicle: VehicleInfo,
    pub working_hours: Option<WorkingHours>,
    pub max_concurrent_orders: u32,
    pub service_areas: Vec<ServiceArea>,
    pub payment: PaymentTerms,
    pub provider: Option<ExternalProvider>,
    #[serde(default)]
    pub rating: f64,
}

#[derive(Deserialize)]
pub struct UpdateRiderStatusRequest {
    pub is_online: Option<bool>,
    pub is_available: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct VerifyRiderRequest {
    pub actor: String,
}

#[derive(Deserialize)]
pub struct AvailableRidersQuery {
    pub lat: f64,
    pub lng: f64,
    pub max_distance: Option<f64>,
}

async fn register_rider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRiderRequest>,
) -> Result<Json<Rider>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.max_concurrent_orders == 0 {
        return Err(AppError::BadRequest(
            "max_concurrent_orders must be > 0".to_string(),
        ));
    }
    if payload.rider_type == RiderType::Internal && payload.user_id.is_none() {
        return Err(AppError::BadRequest(
            "internal riders require a linked user_id".to_string(),
        ));
    }

    let now = Utc::now();
    let mut rider = Rider {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
        government_id: payload.government_id,
        rider_type: payload.rider_type,
        user_id: payload.user_id,
        vehicle: payload.vehicle,
        documents_verified: false,
        status: RiderStatus::PendingVerification,
        status_history: Vec::new(),
        is_online: false,
        is_available: false,
        current_location: None,
        working_hours: payload.working_hours,
        max_concurrent_orders: payload.max_concurrent_orders,
        active_orders: 0,
        service_areas: payload.service_areas,
        stats: RiderStats {
            rating: payload.rating.clamp(0.0, 5.0),
            ..RiderStats::default()
        },
        payment: payload.payment,
        provider: payload.provider,
        created_at: now,
        updated_at: now,
    };
    rider.push_status(
        RiderStatus::PendingVerification,
        "registered, awaiting document checks",
        "system",
    );

    state.riders.insert(rider.id, rider.clone());
    Ok(Json(rider))
}

async fn list_riders(State(state): State<Arc<AppState>>) -> Json<Vec<Rider>> {
    let riders = state
        .riders
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(riders)
}

/// Riders passing the geo and service-area filter for a point, sorted
/// nearest-first.
async fn list_available_riders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailableRidersQuery>,
) -> Json<Vec<Rider>> {
    let point = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };
    let max_distance = query.max_distance.unwrap_or(10.0);

    let mut nearby: Vec<(f64, Rider)> = state
        .riders
        .iter()
        .filter_map(|entry| {
            let rider = entry.value();
            if rider.status != RiderStatus::Active || !rider.is_online || !rider.is_available {
                return None;
            }
            let location = rider.current_location.as_ref()?;
            let distance = haversine_km(&location.point, &point);
            if distance > max_distance {
                return None;
            }
            let in_area = rider
                .service_areas
                .iter()
                .filter(|area| area.is_active)
                .any(|area| haversine_km(&location.point, &area.center) <= area.radius_km);
            if !in_area {
                return None;
            }
            Some((distance, rider.clone()))
        })
        .collect();

    nearby.sort_by(|a, b| a.0.total_cmp(&b.0));
    Json(nearby.into_iter().map(|(_, rider)| rider).collect())
}

async fn update_rider_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRiderStatusRequest>,
) -> Result<Json<Rider>, AppError> {
    let mut rider = state
        .riders
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("rider {id} not found")))?;

    if let Some(is_online) = payload.is_online {
        rider.is_online = is_online;
    }
    if let Some(is_available) = payload.is_available {
        rider.is_available = is_available;
    }
    rider.updated_at = Utc::now();

    Ok(Json(rider.clone()))
}

async fn update_rider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Rider>, AppError> {
    let mut rider = state
        .riders
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("rider {id} not found")))?;

    rider.current_location = Some(RiderLocation {
        point: payload.location,
        updated_at: Utc::now(),
    });
    rider.updated_at = Utc::now();

    Ok(Json(rider.clone()))
}

/// Document verification flips the rider from pending_verification to
/// active and puts the decision on the status history.
async fn verify_rider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyRiderRequest>,
) -> Result<Json<Rider>, AppError> {
    let mut rider = state
        .riders
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("rider {id} not found")))?;

    if rider.status != RiderStatus::PendingVerification {
        return Err(AppError::Conflict(format!(
            "rider {id} is not awaiting verification"
        )));
    }

    rider.documents_verified = true;
    rider.push_status(RiderStatus::Active, "documents verified", &payload.actor);

    Ok(Json(rider.clone()))
}
