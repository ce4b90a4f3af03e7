use crate::engine::scoring::{self, ScoringWeights};
use crate::geo::haversine_km;
use crate::models::assignment::{AssignmentConfig, RiderCandidate};
use crate::models::delivery::Delivery;
use crate::models::rider::{Rider, RiderStats};

/// Flat speed model: two minutes per kilometre plus a five-minute pickup
/// buffer, rounded to whole minutes.
pub fn estimate_minutes(distance_km: f64) -> f64 {
    (distance_km * 2.0 + 5.0).round()
}

/// Filters one rider against one delivery. Rules short-circuit in order:
/// distance ceiling, service-area membership, concurrent-order ceiling.
/// Returns None on the first failing rule.
pub fn evaluate(
    rider: &Rider,
    delivery: &Delivery,
    config: &AssignmentConfig,
    weights: &ScoringWeights,
) -> Option<RiderCandidate> {
    let location = rider.current_location.as_ref()?;

    let distance_km = haversine_km(&location.point, &delivery.pickup.location);
    if distance_km > config.max_distance_km {
        return None;
    }

    let in_service_area = rider
        .service_areas
        .iter()
        .filter(|area| area.is_active)
        .any(|area| haversine_km(&location.point, &area.center) <= area.radius_km);
    if !in_service_area {
        return None;
    }

    if !rider.has_capacity() {
        return None;
    }

    let cost = delivery.fees.delivery_fee * rider.effective_commission_rate() / 100.0;

    let mut candidate = RiderCandidate {
        rider_id: rider.id,
        rider_type: rider.rider_type,
        distance_km,
        estimated_time_minutes: estimate_minutes(distance_km),
        rating: rider.stats.rating,
        availability_score: availability_score(&rider.stats),
        cost,
        score: 0.0,
    };
    candidate.score = scoring::compute_score(&candidate, weights);

    Some(candidate)
}

/// Reliability signal from historical counters. Starts at 100; late and
/// cancelled deliveries subtract, on-time deliveries add back. A rider
/// with no history keeps the base 100.
pub fn availability_score(stats: &RiderStats) -> f64 {
    if stats.total_deliveries == 0 {
        return 100.0;
    }

    let total = stats.total_deliveries as f64;
    let score = 100.0 - (stats.late_deliveries as f64 / total) * 30.0
        - (stats.cancelled_deliveries as f64 / total) * 50.0
        + (stats.on_time_deliveries as f64 / total) * 20.0;

    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::assignment::AssignmentConfig;
    use crate::models::delivery::{
        DEFAULT_RIDER_SHARE, Delivery, DeliveryStatus, DropoffPoint, FeeBreakdown, PickupPoint,
    };
    use crate::models::rider::{
        ExternalProvider, GeoPoint, PaymentMethod, PaymentTerms, Rider, RiderLocation, RiderStats,
        RiderStatus, RiderType, ServiceArea, VehicleInfo, VehicleKind,
    };

    fn rider_at(lat: f64, lng: f64) -> Rider {
        Rider {
            id: Uuid::new_v4(),
            name: "eval-rider".to_string(),
            phone: "+100".to_string(),
            government_id: "ID-9".to_string(),
            rider_type: RiderType::Internal,
            user_id: Some(Uuid::new_v4()),
            vehicle: VehicleInfo {
                kind: VehicleKind::Motorcycle,
                plate: "AB-12".to_string(),
            },
            documents_verified: true,
            status: RiderStatus::Active,
            status_history: Vec::new(),
            is_online: true,
            is_available: true,
            current_location: Some(RiderLocation {
                point: GeoPoint { lat, lng },
                updated_at: Utc::now(),
            }),
            working_hours: None,
            max_concurrent_orders: 2,
            active_orders: 0,
            service_areas: vec![ServiceArea {
                name: "downtown".to_string(),
                center: GeoPoint { lat, lng },
                radius_km: 20.0,
                is_active: true,
            }],
            stats: RiderStats {
                rating: 4.5,
                ..RiderStats::default()
            },
            payment: PaymentTerms {
                method: PaymentMethod::BankTransfer,
                commission_rate: 80.0,
            },
            provider: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn delivery_at(lat: f64, lng: f64) -> Delivery {
        Delivery {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            tracking_code: None,
            tracking_url: None,
            rider_id: None,
            external_rider_id: None,
            rider_type: None,
            rider_snapshot: None,
            pickup: PickupPoint {
                address: "1 Store St".to_string(),
                location: GeoPoint { lat, lng },
                store_name: "AutoParts".to_string(),
            },
            dropoff: DropoffPoint {
                address: "2 Home Ave".to_string(),
                location: GeoPoint {
                    lat: lat + 0.02,
                    lng: lng + 0.02,
                },
                customer_name: "Sam".to_string(),
                phone: "+200".to_string(),
                instructions: None,
            },
            fees: FeeBreakdown::split(10.0, DEFAULT_RIDER_SHARE),
            estimated_pickup_at: None,
            actual_pickup_at: None,
            estimated_delivery_at: None,
            actual_delivery_at: None,
            status: DeliveryStatus::Pending,
            status_history: Vec::new(),
            assignment_config: AssignmentConfig::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rider_beyond_max_distance_is_rejected() {
        let rider = rider_at(53.55, 9.99);
        let delivery = delivery_at(53.80, 10.40);
        let config = AssignmentConfig {
            max_distance_km: 5.0,
            ..AssignmentConfig::default()
        };
        assert!(evaluate(&rider, &delivery, &config, &ScoringWeights::default()).is_none());
    }

    #[test]
    fn rider_outside_all_active_areas_is_rejected() {
        let mut rider = rider_at(53.55, 9.99);
        rider.service_areas = vec![ServiceArea {
            name: "far-suburb".to_string(),
            center: GeoPoint {
                lat: 54.5,
                lng: 11.0,
            },
            radius_km: 2.0,
            is_active: true,
        }];
        let delivery = delivery_at(53.55, 9.99);
        let config = AssignmentConfig::default();
        assert!(evaluate(&rider, &delivery, &config, &ScoringWeights::default()).is_none());
    }

    #[test]
    fn inactive_area_does_not_qualify_the_rider() {
        let mut rider = rider_at(53.55, 9.99);
        rider.service_areas[0].is_active = false;
        let delivery = delivery_at(53.55, 9.99);
        let config = AssignmentConfig::default();
        assert!(evaluate(&rider, &delivery, &config, &ScoringWeights::default()).is_none());
    }

    #[test]
    fn rider_at_order_ceiling_is_rejected() {
        let mut rider = rider_at(53.55, 9.99);
        rider.max_concurrent_orders = 1;
        rider.active_orders = 1;
        let delivery = delivery_at(53.55, 9.99);
        let config = AssignmentConfig::default();
        assert!(evaluate(&rider, &delivery, &config, &ScoringWeights::default()).is_none());
    }

    #[test]
    fn rider_without_location_is_rejected() {
        let mut rider = rider_at(53.55, 9.99);
        rider.current_location = None;
        let delivery = delivery_at(53.55, 9.99);
        let config = AssignmentConfig::default();
        assert!(evaluate(&rider, &delivery, &config, &ScoringWeights::default()).is_none());
    }

    #[test]
    fn passing_rider_gets_flat_speed_eta() {
        let rider = rider_at(53.55, 9.99);
        let delivery = delivery_at(53.55, 9.99);
        let config = AssignmentConfig::default();
        let candidate =
            evaluate(&rider, &delivery, &config, &ScoringWeights::default()).unwrap();
        assert!(candidate.distance_km < 0.01);
        assert_eq!(candidate.estimated_time_minutes, 5.0);
        assert!(candidate.score > 0.0);
    }

    #[test]
    fn external_cost_uses_provider_rate() {
        let mut rider = rider_at(53.55, 9.99);
        rider.rider_type = RiderType::External;
        rider.user_id = None;
        rider.provider = Some(ExternalProvider {
            name: "FastFleet".to_string(),
            commission_rate: 30.0,
        });
        let delivery = delivery_at(53.55, 9.99);
        let config = AssignmentConfig::default();
        let candidate =
            evaluate(&rider, &delivery, &config, &ScoringWeights::default()).unwrap();
        assert!((candidate.cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_history_rider_scores_base_availability() {
        assert_eq!(availability_score(&RiderStats::default()), 100.0);
    }

    #[test]
    fn availability_score_stays_in_bounds() {
        let bad = RiderStats {
            total_deliveries: 10,
            cancelled_deliveries: 10,
            late_deliveries: 10,
            ..RiderStats::default()
        };
        assert_eq!(availability_score(&bad), 20.0);

        let worst = RiderStats {
            total_deliveries: 1,
            cancelled_deliveries: 1,
            late_deliveries: 1,
            on_time_deliveries: 0,
            ..RiderStats::default()
        };
        let score = availability_score(&worst);
        assert!((0.0..=100.0).contains(&score));

        let perfect = RiderStats {
            total_deliveries: 10,
            completed_deliveries: 10,
            on_time_deliveries: 10,
            ..RiderStats::default()
        };
        assert_eq!(availability_score(&perfect), 100.0);
    }
}
