use crate::errors::DispatchEngineError;
use chrono::{DateTime, Utc};
use parcel_core::{
    DeliveryStatus, Earning, EarningRule, EarningStatus, Parcel, PaymentStatus, Rider,
    RiderStatus, RiderWorkStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Parcel row as stored (status columns are TEXT)
#[derive(Debug, Clone, FromRow)]
pub struct ParcelRow {
    pub id: Uuid,
    pub tracking_code: String,
    pub title: String,
    pub sender_region: String,
    pub receiver_region: String,
    pub cost: Decimal,
    pub delivery_status: String,
    pub assigned_rider_name: Option<String>,
    pub assigned_rider_email: Option<String>,
    pub payment_status: String,
    pub payment_transaction_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ParcelRow> for Parcel {
    type Error = DispatchEngineError;

    fn try_from(row: ParcelRow) -> Result<Self, Self::Error> {
        let delivery_status = DeliveryStatus::from_str(&row.delivery_status).ok_or_else(|| {
            DispatchEngineError::Internal(format!(
                "parcel {} has unknown delivery_status '{}'",
                row.id, row.delivery_status
            ))
        })?;
        let payment_status = PaymentStatus::from_str(&row.payment_status).ok_or_else(|| {
            DispatchEngineError::Internal(format!(
                "parcel {} has unknown payment_status '{}'",
                row.id, row.payment_status
            ))
        })?;

        Ok(Parcel {
            id: row.id,
            tracking_code: row.tracking_code,
            title: row.title,
            sender_region: row.sender_region,
            receiver_region: row.receiver_region,
            cost: row.cost,
            delivery_status,
            assigned_rider_name: row.assigned_rider_name,
            assigned_rider_email: row.assigned_rider_email,
            payment_status,
            payment_transaction_id: row.payment_transaction_id,
            created_by: row.created_by,
            created_at: row.created_at,
            assigned_at: row.assigned_at,
            delivered_at: row.delivered_at,
            updated_at: row.updated_at,
        })
    }
}

/// Earning row as stored
#[derive(Debug, Clone, FromRow)]
pub struct EarningRow {
    pub id: Uuid,
    pub parcel_id: Uuid,
    pub rider_email: String,
    pub amount: i64,
    pub rule: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<EarningRow> for Earning {
    type Error = DispatchEngineError;

    fn try_from(row: EarningRow) -> Result<Self, Self::Error> {
        let rule = EarningRule::from_str(&row.rule).ok_or_else(|| {
            DispatchEngineError::Internal(format!(
                "earning {} has unknown rule '{}'",
                row.id, row.rule
            ))
        })?;
        let status = EarningStatus::from_str(&row.status).ok_or_else(|| {
            DispatchEngineError::Internal(format!(
                "earning {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Earning {
            id: row.id,
            parcel_id: row.parcel_id,
            rider_email: row.rider_email,
            amount: row.amount,
            rule,
            status,
            created_at: row.created_at,
            paid_at: row.paid_at,
        })
    }
}

/// Rider row as stored
#[derive(Debug, Clone, FromRow)]
pub struct RiderRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub region: String,
    pub district: String,
    pub status: String,
    pub work_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RiderRow> for Rider {
    type Error = DispatchEngineError;

    fn try_from(row: RiderRow) -> Result<Self, Self::Error> {
        let status = RiderStatus::from_str(&row.status).ok_or_else(|| {
            DispatchEngineError::Internal(format!(
                "rider {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        let work_status = RiderWorkStatus::from_str(&row.work_status).ok_or_else(|| {
            DispatchEngineError::Internal(format!(
                "rider {} has unknown work_status '{}'",
                row.id, row.work_status
            ))
        })?;

        Ok(Rider {
            id: row.id,
            name: row.name,
            email: row.email,
            region: row.region,
            district: row.district,
            status,
            work_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Parcel creation request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct CreateParcelRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub sender_region: String,
    #[validate(length(min = 1, max = 100))]
    pub receiver_region: String,
    pub cost: Decimal,
}

/// Rider assignment request (admin operation)
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct AssignRiderRequest {
    #[validate(length(min = 1, max = 100))]
    pub rider_name: String,
    #[validate(email)]
    pub rider_email: String,
}

/// Delivery status advance request
#[derive(Debug, Deserialize, Serialize)]
pub struct AdvanceStatusRequest {
    pub status: String,
}

/// Payment result recording request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct RecordPaymentRequest {
    #[validate(length(min = 1, max = 200))]
    pub transaction_id: String,
}

/// Rider registration request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct CreateRiderRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub region: String,
    #[validate(length(min = 1, max = 100))]
    pub district: String,
}

/// Cash-out request
#[derive(Debug, Deserialize, Serialize)]
pub struct CashOutRequest {
    pub amount: i64,
}

/// Cash-out response: figures follow the request arithmetic even when the
/// settled whole-earning sum overshoots
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CashOutResponse {
    pub paid_amount: i64,
    pub remaining_unpaid: i64,
}

/// One delivered parcel in a rider's earnings summary
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliverySummary {
    pub parcel_id: Uuid,
    pub tracking_code: String,
    pub title: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub amount: i64,
    pub rule: EarningRule,
}

/// Rider earnings summary, recomputed from delivered parcels
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EarningsSummaryResponse {
    pub rider_email: String,
    pub total: i64,
    pub deliveries: Vec<DeliverySummary>,
}

/// Delivery event for NATS; cash-out events carry no parcel
#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub event_type: DeliveryEventType,
    pub parcel_id: Option<Uuid>,
    pub tracking_code: Option<String>,
    pub rider_email: Option<String>,
    pub amount: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum DeliveryEventType {
    ParcelCreated,
    RiderAssigned,
    StatusAdvanced,
    Delivered,
    EarningRecorded,
    PaymentRecorded,
    CashedOut,
}
