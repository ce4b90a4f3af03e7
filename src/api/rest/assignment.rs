use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::assignment::{AssignmentOutcome, assign_delivery, reassign_delivery};
use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery-assignment/:id/assign", post(assign))
        .route("/delivery-assignment/:id/reassign", post(reassign))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Deserialize)]
pub struct ReassignRequest {
    pub rider_id: Uuid,
    pub reason: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_actor() -> String {
    "system".to_string()
}

async fn assign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    let actor = payload.actor;

    let start = Instant::now();
    let result = assign_delivery(&state, id, &actor).await;
    let elapsed = start.elapsed().as_secs_f64();

    let outcome_label = if result.is_ok() { "success" } else { "error" };
    state
        .metrics
        .assignment_latency_seconds
        .with_label_values(&[outcome_label])
        .observe(elapsed);
    state
        .metrics
        .assignments_total
        .with_label_values(&[outcome_label])
        .inc();

    result.map(Json)
}

async fn reassign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReassignRequest>,
) -> Result<Json<Delivery>, AppError> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::BadRequest(
            "reassignment requires a reason".to_string(),
        ));
    }

    let delivery =
        reassign_delivery(&state, id, payload.rider_id, &payload.reason, &payload.actor).await?;
    Ok(Json(delivery))
}
