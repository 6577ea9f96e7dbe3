//! Core types for parcel coordination
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for costs, integer minor units for earnings)
//! - Text codecs matching the stored status columns
//! - Memory safety (no unsafe code)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Delivery lifecycle status.
///
/// Declaration order is lifecycle order; the derived `Ord` drives the
/// forward-only transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created, waiting for a rider
    NotCollected,
    /// Rider assigned, pickup pending
    RiderAssigned,
    /// Rider carrying the parcel
    InTransit,
    /// Handed over to the receiver (terminal)
    Delivered,
}

impl DeliveryStatus {
    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::NotCollected => "not_collected",
            DeliveryStatus::RiderAssigned => "rider_assigned",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
        }
    }

    /// Parse from stored column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_collected" => Some(DeliveryStatus::NotCollected),
            "rider_assigned" => Some(DeliveryStatus::RiderAssigned),
            "in_transit" => Some(DeliveryStatus::InTransit),
            "delivered" => Some(DeliveryStatus::Delivered),
            _ => None,
        }
    }

    /// Whether the lifecycle ends here
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }

    /// Statuses a rider may advance to
    pub fn is_rider_settable(&self) -> bool {
        matches!(self, DeliveryStatus::InTransit | DeliveryStatus::Delivered)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status of a parcel (sender-side payment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Sender has not paid yet
    Unpaid,
    /// Gateway confirmed the payment
    Paid,
}

impl PaymentStatus {
    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }

    /// Parse from stored column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Settlement status of a ledger earning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
    /// Eligible for cash-out
    Unpaid,
    /// Settled by a cash-out
    Paid,
}

impl EarningStatus {
    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningStatus::Unpaid => "unpaid",
            EarningStatus::Paid => "paid",
        }
    }

    /// Parse from stored column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(EarningStatus::Unpaid),
            "paid" => Some(EarningStatus::Paid),
            _ => None,
        }
    }
}

/// Which payout rate produced an earning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningRule {
    /// Sender and receiver regions are equal
    SameRegion,
    /// Delivery crossed a region boundary
    CrossRegion,
}

impl EarningRule {
    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningRule::SameRegion => "same_region",
            EarningRule::CrossRegion => "cross_region",
        }
    }

    /// Parse from stored column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "same_region" => Some(EarningRule::SameRegion),
            "cross_region" => Some(EarningRule::CrossRegion),
            _ => None,
        }
    }
}

impl fmt::Display for EarningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rider onboarding status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    /// Registered, awaiting approval
    Pending,
    /// Approved for deliveries
    Active,
    /// Application rejected
    Rejected,
    /// Deactivated account
    Inactive,
}

impl RiderStatus {
    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            RiderStatus::Pending => "pending",
            RiderStatus::Active => "active",
            RiderStatus::Rejected => "rejected",
            RiderStatus::Inactive => "inactive",
        }
    }

    /// Parse from stored column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RiderStatus::Pending),
            "active" => Some(RiderStatus::Active),
            "rejected" => Some(RiderStatus::Rejected),
            "inactive" => Some(RiderStatus::Inactive),
            _ => None,
        }
    }
}

/// Rider availability, toggled by the assignment handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderWorkStatus {
    /// Free to take a parcel
    Available,
    /// Currently carrying a parcel
    InDelivery,
}

impl RiderWorkStatus {
    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            RiderWorkStatus::Available => "available",
            RiderWorkStatus::InDelivery => "in_delivery",
        }
    }

    /// Parse from stored column value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(RiderWorkStatus::Available),
            "in_delivery" => Some(RiderWorkStatus::InDelivery),
            _ => None,
        }
    }
}

/// A parcel moving through the delivery lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    /// Unique parcel ID
    pub id: Uuid,

    /// Human-facing reference printed on the label
    pub tracking_code: String,

    /// Short description entered by the sender
    pub title: String,

    /// Pickup region
    pub sender_region: String,

    /// Drop-off region
    pub receiver_region: String,

    /// Delivery cost charged to the sender (exact decimal)
    pub cost: Decimal,

    /// Current lifecycle status
    pub delivery_status: DeliveryStatus,

    /// Assigned rider display name (set by assignment)
    pub assigned_rider_name: Option<String>,

    /// Assigned rider identity; the only actor allowed to advance status
    pub assigned_rider_email: Option<String>,

    /// Sender-side payment status
    pub payment_status: PaymentStatus,

    /// Gateway transaction ID once recorded
    pub payment_transaction_id: Option<String>,

    /// Identity that created the parcel
    pub created_by: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When a rider was assigned
    pub assigned_at: Option<DateTime<Utc>>,

    /// When the parcel reached `delivered`
    pub delivered_at: Option<DateTime<Utc>>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Parcel {
    /// Whether the parcel has completed delivery
    pub fn is_delivered(&self) -> bool {
        self.delivery_status == DeliveryStatus::Delivered
    }

    /// Whether `email` is the assigned rider
    pub fn is_assigned_to(&self, email: &str) -> bool {
        self.assigned_rider_email.as_deref() == Some(email)
    }

    /// Whether pickup and drop-off share a region (exact comparison)
    pub fn is_same_region(&self) -> bool {
        self.sender_region == self.receiver_region
    }

    /// Structural invariants:
    /// an assigned rider whenever the status is past `not_collected`,
    /// and `delivered_at` exactly on delivered parcels.
    pub fn is_consistent(&self) -> bool {
        let rider_ok = match self.delivery_status {
            DeliveryStatus::NotCollected => true,
            _ => self.assigned_rider_email.is_some(),
        };
        let delivered_ok = self.is_delivered() == self.delivered_at.is_some();
        rider_ok && delivered_ok
    }
}

/// One ledger entry: what a rider earned for one delivered parcel
///
/// Earnings are append-only. After creation only `status` and `paid_at`
/// change, and only from `unpaid` to `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earning {
    /// Unique earning ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Delivered parcel this earning settles (one earning per parcel)
    pub parcel_id: Uuid,

    /// Rider who delivered the parcel
    pub rider_email: String,

    /// Rounded payout in whole currency units
    pub amount: i64,

    /// Rate rule that produced `amount`
    pub rule: EarningRule,

    /// Settlement status
    pub status: EarningStatus,

    /// When the earning was recorded
    pub created_at: DateTime<Utc>,

    /// When a cash-out settled it
    pub paid_at: Option<DateTime<Utc>>,
}

impl Earning {
    /// Whether this earning is still eligible for cash-out
    pub fn is_unpaid(&self) -> bool {
        self.status == EarningStatus::Unpaid
    }
}

/// A registered rider profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    /// Unique rider ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Identity email (unique)
    pub email: String,

    /// Home region
    pub region: String,

    /// Home district
    pub district: String,

    /// Onboarding status
    pub status: RiderStatus,

    /// Availability flag
    pub work_status: RiderWorkStatus,

    /// Registration timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_parcel(status: DeliveryStatus) -> Parcel {
        let now = Utc::now();
        Parcel {
            id: Uuid::new_v4(),
            tracking_code: "PR-TEST0001".to_string(),
            title: "Books".to_string(),
            sender_region: "dhaka".to_string(),
            receiver_region: "dhaka".to_string(),
            cost: dec!(100),
            delivery_status: status,
            assigned_rider_name: Some("Rafi".to_string()),
            assigned_rider_email: Some("rafi@example.com".to_string()),
            payment_status: PaymentStatus::Unpaid,
            payment_transaction_id: None,
            created_by: "sender@example.com".to_string(),
            created_at: now,
            assigned_at: Some(now),
            delivered_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_order_is_lifecycle_order() {
        assert!(DeliveryStatus::NotCollected < DeliveryStatus::RiderAssigned);
        assert!(DeliveryStatus::RiderAssigned < DeliveryStatus::InTransit);
        assert!(DeliveryStatus::InTransit < DeliveryStatus::Delivered);
    }

    #[test]
    fn test_status_codec_round_trip() {
        for status in [
            DeliveryStatus::NotCollected,
            DeliveryStatus::RiderAssigned,
            DeliveryStatus::InTransit,
            DeliveryStatus::Delivered,
        ] {
            assert_eq!(DeliveryStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DeliveryStatus::from_str("shipped"), None);
    }

    #[test]
    fn test_status_serde_matches_column_values() {
        let json = serde_json::to_string(&DeliveryStatus::RiderAssigned).unwrap();
        assert_eq!(json, "\"rider_assigned\"");
        let json = serde_json::to_string(&EarningRule::CrossRegion).unwrap();
        assert_eq!(json, "\"cross_region\"");
    }

    #[test]
    fn test_assignment_predicate() {
        let parcel = sample_parcel(DeliveryStatus::RiderAssigned);
        assert!(parcel.is_assigned_to("rafi@example.com"));
        assert!(!parcel.is_assigned_to("other@example.com"));
    }

    #[test]
    fn test_consistency_requires_rider_after_assignment() {
        let mut parcel = sample_parcel(DeliveryStatus::InTransit);
        assert!(parcel.is_consistent());

        parcel.assigned_rider_email = None;
        assert!(!parcel.is_consistent());
    }

    #[test]
    fn test_consistency_requires_delivered_at_iff_delivered() {
        let mut parcel = sample_parcel(DeliveryStatus::Delivered);
        assert!(!parcel.is_consistent());

        parcel.delivered_at = Some(Utc::now());
        assert!(parcel.is_consistent());

        parcel.delivery_status = DeliveryStatus::InTransit;
        assert!(!parcel.is_consistent());
    }
}
