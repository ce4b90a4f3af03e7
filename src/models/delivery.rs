use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::assignment::AssignmentConfig;
use crate::models::rider::{GeoPoint, RiderType};

/// Share of the delivery fee paid to the rider when no explicit split is given.
pub const DEFAULT_RIDER_SHARE: f64 = 0.80;

const TRACKING_PREFIX: &str = "TRK";
const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    Accepted,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
    Failed,
}

impl DeliveryStatus {
    /// Active states count against a rider's concurrent-order ceiling.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Assigned | Self::Accepted | Self::PickedUp | Self::InTransit
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Failed)
    }

    /// Forward-only lifecycle; terminal states never resurrect.
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Assigned | Self::Cancelled | Self::Failed),
            Self::Assigned => matches!(
                next,
                Self::Accepted | Self::PickedUp | Self::Cancelled | Self::Failed
            ),
            Self::Accepted => matches!(next, Self::PickedUp | Self::Cancelled | Self::Failed),
            Self::PickedUp => matches!(next, Self::InTransit | Self::Delivered | Self::Failed),
            Self::InTransit => matches!(next, Self::Delivered | Self::Failed),
            Self::Delivered | Self::Cancelled | Self::Failed => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    pub note: String,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupPoint {
    pub address: String,
    pub location: GeoPoint,
    pub store_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropoffPoint {
    pub address: String,
    pub location: GeoPoint,
    pub customer_name: String,
    pub phone: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub delivery_fee: f64,
    pub rider_payment: f64,
    pub platform_fee: f64,
}

impl FeeBreakdown {
    /// Splits the fee so that rider_payment + platform_fee == delivery_fee.
    pub fn split(delivery_fee: f64, rider_share: f64) -> Self {
        let rider_payment = delivery_fee * rider_share;
        Self {
            delivery_fee,
            rider_payment,
            platform_fee: delivery_fee - rider_payment,
        }
    }
}

/// Contact snapshot taken from the winning rider at commit time, so the
/// customer-facing record survives later rider edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderSnapshot {
    pub name: String,
    pub phone: String,
    pub vehicle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub tracking_code: Option<String>,
    pub tracking_url: Option<String>,
    pub rider_id: Option<Uuid>,
    pub external_rider_id: Option<Uuid>,
    pub rider_type: Option<RiderType>,
    pub rider_snapshot: Option<RiderSnapshot>,
    pub pickup: PickupPoint,
    pub dropoff: DropoffPoint,
    pub fees: FeeBreakdown,
    pub estimated_pickup_at: Option<DateTime<Utc>>,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub status: DeliveryStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub assignment_config: AssignmentConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    /// Appends a history entry and keeps the current status in sync with
    /// the log's last entry.
    pub fn push_status(&mut self, status: DeliveryStatus, note: &str, actor: &str) {
        let now = Utc::now();
        self.status = status;
        self.status_history.push(StatusHistoryEntry {
            status,
            timestamp: now,
            note: note.to_string(),
            actor: actor.to_string(),
        });
        self.updated_at = now;
    }

    /// The rider currently responsible, regardless of pool.
    pub fn assigned_rider(&self) -> Option<Uuid> {
        self.rider_id.or(self.external_rider_id)
    }
}

/// Customer-facing reference: prefix, base36 creation millis, five random
/// base36 characters, all upper-case.
pub fn generate_tracking_code() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{TRACKING_PREFIX}{}{}", to_base36(millis), suffix)
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::assignment::AssignmentConfig;

    fn delivery() -> Delivery {
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
                location: GeoPoint { lat: 0.0, lng: 0.0 },
                store_name: "AutoParts".to_string(),
            },
            dropoff: DropoffPoint {
                address: "2 Home Ave".to_string(),
                location: GeoPoint { lat: 0.1, lng: 0.1 },
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
    fn fee_split_sums_to_delivery_fee() {
        let fees = FeeBreakdown::split(10.0, 0.80);
        assert!((fees.rider_payment - 8.0).abs() < 1e-9);
        assert!((fees.rider_payment + fees.platform_fee - fees.delivery_fee).abs() < 1e-9);
    }

    #[test]
    fn terminal_statuses_never_transition() {
        for terminal in [
            DeliveryStatus::Delivered,
            DeliveryStatus::Cancelled,
            DeliveryStatus::Failed,
        ] {
            assert!(!terminal.can_transition_to(DeliveryStatus::Assigned));
            assert!(!terminal.can_transition_to(DeliveryStatus::Pending));
        }
    }

    #[test]
    fn pending_cannot_skip_to_delivered() {
        assert!(!DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Delivered));
        assert!(DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Assigned));
    }

    #[test]
    fn push_status_keeps_history_in_sync() {
        let mut d = delivery();
        d.push_status(DeliveryStatus::Assigned, "rider chosen", "system");
        d.push_status(DeliveryStatus::Accepted, "", "rider");
        assert_eq!(d.status_history.last().unwrap().status, d.status);
        assert_eq!(d.status_history.len(), 2);
    }

    #[test]
    fn tracking_code_is_uppercase_alphanumeric_with_prefix() {
        let code = generate_tracking_code();
        assert!(code.starts_with("TRK"));
        assert!(code.len() > 10);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn tracking_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(generate_tracking_code()));
        }
    }
}
