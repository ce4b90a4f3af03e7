use crate::models::assignment::RiderCandidate;
use crate::models::rider::RiderType;

/// Ranking weights and the internal-pool bonus. The defaults are policy
/// constants: changing them changes observable ranking behavior and must be
/// treated as a policy change, not a bug fix.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub distance: f64,
    pub time: f64,
    pub rating: f64,
    pub availability: f64,
    pub cost: f64,
    pub internal_bonus: f64,
}

pub const DISTANCE_WEIGHT: f64 = 0.25;
pub const TIME_WEIGHT: f64 = 0.20;
pub const RATING_WEIGHT: f64 = 0.25;
pub const AVAILABILITY_WEIGHT: f64 = 0.20;
pub const COST_WEIGHT: f64 = 0.10;
pub const INTERNAL_BONUS: f64 = 1.10;

/// Normalization ceilings: a 10 km trip, 30 minute ETA, or $10 commission
/// each score zero on their axis.
const DISTANCE_CEILING_KM: f64 = 10.0;
const TIME_CEILING_MINUTES: f64 = 30.0;
const COST_CEILING: f64 = 10.0;

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: DISTANCE_WEIGHT,
            time: TIME_WEIGHT,
            rating: RATING_WEIGHT,
            availability: AVAILABILITY_WEIGHT,
            cost: COST_WEIGHT,
            internal_bonus: INTERNAL_BONUS,
        }
    }
}

/// Collapses a candidate's sub-scores into its final ranking score.
/// Internal riders receive the multiplicative bonus on the weighted sum.
pub fn compute_score(candidate: &RiderCandidate, weights: &ScoringWeights) -> f64 {
    let base = weights.distance * distance_score(candidate.distance_km)
        + weights.time * time_score(candidate.estimated_time_minutes)
        + weights.rating * rating_score(candidate.rating)
        + weights.availability * candidate.availability_score
        + weights.cost * cost_score(candidate.cost);

    match candidate.rider_type {
        RiderType::Internal => base * weights.internal_bonus,
        RiderType::External => base,
    }
}

fn distance_score(distance_km: f64) -> f64 {
    (100.0 - (distance_km / DISTANCE_CEILING_KM) * 100.0).max(0.0)
}

fn time_score(estimated_minutes: f64) -> f64 {
    (100.0 - (estimated_minutes / TIME_CEILING_MINUTES) * 100.0).max(0.0)
}

fn rating_score(rating: f64) -> f64 {
    (rating * 20.0).clamp(0.0, 100.0)
}

fn cost_score(cost: f64) -> f64 {
    (100.0 - (cost / COST_CEILING) * 100.0).max(0.0)
}
