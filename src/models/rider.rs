use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderType {
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    PendingVerification,
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Bicycle,
    Motorcycle,
    Car,
    Van,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub kind: VehicleKind,
    pub plate: String,
}

impl VehicleInfo {
    pub fn describe(&self) -> String {
        format!("{:?} ({})", self.kind, self.plate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Cash,
    MobileWallet,
}

/// Commission terms for paying the rider out of the delivery fee.
/// `commission_rate` is a percentage of the fee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTerms {
    pub method: PaymentMethod,
    pub commission_rate: f64,
}

/// External riders belong to a provider whose commission rate overrides
/// the individual rider's rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalProvider {
    pub name: String,
    pub commission_rate: f64,
}

/// A named circular geofence the rider is willing to operate inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceArea {
    pub name: String,
    pub center: GeoPoint,
    pub radius_km: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderLocation {
    pub point: GeoPoint,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
}

/// Historical performance counters, recomputed by the stats aggregator
/// after each completed or cancelled delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderStats {
    pub rating: f64,
    pub total_deliveries: u64,
    pub completed_deliveries: u64,
    pub cancelled_deliveries: u64,
    pub on_time_deliveries: u64,
    pub late_deliveries: u64,
    pub total_earnings: f64,
    pub total_distance_km: f64,
    pub average_delivery_time_minutes: f64,
}

impl Default for RiderStats {
    fn default() -> Self {
        Self {
            rating: 0.0,
            total_deliveries: 0,
            completed_deliveries: 0,
            cancelled_deliveries: 0,
            on_time_deliveries: 0,
            late_deliveries: 0,
            total_earnings: 0.0,
            total_distance_km: 0.0,
            average_delivery_time_minutes: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderStatusEntry {
    pub status: RiderStatus,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub government_id: String,
    pub rider_type: RiderType,
    /// Employee account linkage, internal riders only.
    pub user_id: Option<Uuid>,
    pub vehicle: VehicleInfo,
    pub documents_verified: bool,
    pub status: RiderStatus,
    pub status_history: Vec<RiderStatusEntry>,
    pub is_online: bool,
    pub is_available: bool,
    pub current_location: Option<RiderLocation>,
    pub working_hours: Option<WorkingHours>,
    pub max_concurrent_orders: u32,
    pub active_orders: u32,
    pub service_areas: Vec<ServiceArea>,
    pub stats: RiderStats,
    pub payment: PaymentTerms,
    pub provider: Option<ExternalProvider>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rider {
    /// External riders are paid at their provider's rate, not their own.
    pub fn effective_commission_rate(&self) -> f64 {
        match self.rider_type {
            RiderType::External => self
                .provider
                .as_ref()
                .map(|p| p.commission_rate)
                .unwrap_or(self.payment.commission_rate),
            RiderType::Internal => self.payment.commission_rate,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.active_orders < self.max_concurrent_orders
    }

    pub fn push_status(&mut self, status: RiderStatus, reason: &str, actor: &str) {
        let now = Utc::now();
        self.status = status;
        self.status_history.push(RiderStatusEntry {
            status,
            timestamp: now,
            reason: reason.to_string(),
            actor: actor.to_string(),
        });
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_rider(rider_type: RiderType) -> Rider {
        Rider {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            phone: "+100".to_string(),
            government_id: "ID-1".to_string(),
            rider_type,
            user_id: None,
            vehicle: VehicleInfo {
                kind: VehicleKind::Motorcycle,
                plate: "XYZ-1".to_string(),
            },
            documents_verified: true,
            status: RiderStatus::Active,
            status_history: Vec::new(),
            is_online: true,
            is_available: true,
            current_location: None,
            working_hours: None,
            max_concurrent_orders: 2,
            active_orders: 0,
            service_areas: Vec::new(),
            stats: RiderStats::default(),
            payment: PaymentTerms {
                method: PaymentMethod::BankTransfer,
                commission_rate: 80.0,
            },
            provider: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn external_rider_uses_provider_rate() {
        let mut rider = base_rider(RiderType::External);
        rider.provider = Some(ExternalProvider {
            name: "FastFleet".to_string(),
            commission_rate: 30.0,
        });
        assert_eq!(rider.effective_commission_rate(), 30.0);
    }

    #[test]
    fn internal_rider_keeps_own_rate() {
        let rider = base_rider(RiderType::Internal);
        assert_eq!(rider.effective_commission_rate(), 80.0);
    }

    #[test]
    fn push_status_appends_history_and_syncs_current() {
        let mut rider = base_rider(RiderType::Internal);
        rider.push_status(RiderStatus::Suspended, "missing documents", "admin");
        assert_eq!(rider.status, RiderStatus::Suspended);
        let last = rider.status_history.last().unwrap();
        assert_eq!(last.status, rider.status);
        assert_eq!(last.reason, "missing documents");
    }
}
