use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::rider::RiderType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    InternalFirst,
    ExternalFirst,
    Mixed,
}

/// Policy controlling which rider pool(s) are tried and in what blend.
/// Snapshotted onto each delivery so audits can reproduce the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    pub priority: PriorityMode,
    /// Target share of internal candidates in the mixed-mode shortlist.
    pub internal_percentage: u8,
    /// Advisory only; no timer enforces it.
    pub max_wait_time_minutes: u32,
    pub max_distance_km: f64,
    #[serde(default)]
    pub force_internal: bool,
    #[serde(default)]
    pub force_external: bool,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            priority: PriorityMode::InternalFirst,
            internal_percentage: 80,
            max_wait_time_minutes: 15,
            max_distance_km: 10.0,
            force_internal: false,
            force_external: false,
        }
    }
}

impl AssignmentConfig {
    /// Checked before any pool query.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.force_internal && self.force_external {
            return Err(AppError::InvalidPolicy(
                "force_internal and force_external are mutually exclusive".to_string(),
            ));
        }
        if self.internal_percentage > 100 {
            return Err(AppError::InvalidPolicy(
                "internal_percentage must be between 0 and 100".to_string(),
            ));
        }
        if self.max_distance_km <= 0.0 {
            return Err(AppError::InvalidPolicy(
                "max_distance_km must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// One rider evaluated against one delivery. Ephemeral: discarded once the
/// winning candidate is committed.
#[derive(Debug, Clone, Serialize)]
pub struct RiderCandidate {
    pub rider_id: Uuid,
    pub rider_type: RiderType,
    pub distance_km: f64,
    pub estimated_time_minutes: f64,
    pub rating: f64,
    pub availability_score: f64,
    pub cost: f64,
    pub score: f64,
}

/// Broadcast to websocket subscribers when an assignment commits.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentEvent {
    pub delivery_id: Uuid,
    pub rider_id: Uuid,
    pub rider_type: RiderType,
    pub tracking_code: String,
    pub score: f64,
    pub distance_km: f64,
    pub assigned_at: DateTime<Utc>,
}
