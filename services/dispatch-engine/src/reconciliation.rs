// Ledger reconciliation - detects gaps between delivered parcels and earnings

use crate::database::Database;
use crate::errors::{DispatchEngineError, Result};
use chrono::{DateTime, Utc};
use parcel_core::{delivery_payout, Earning, Parcel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Parcel is delivered but the ledger has no entry for it
    MissingEarning,
    /// Ledger amount differs from recomputation
    AmountMismatch,
    /// Ledger rule differs from the regions on the parcel
    RuleMismatch,
    /// Ledger entry credits a different rider than the parcel's
    RiderMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDiscrepancy {
    pub parcel_id: Uuid,
    pub tracking_code: String,
    pub rider_email: Option<String>,
    pub kind: DiscrepancyKind,
    pub expected_amount: Option<i64>,
    pub actual_amount: Option<i64>,
    pub detected_at: DateTime<Utc>,
}

/// Compare one ledger entry against a recomputation from its parcel.
///
/// Returns the first mismatch found: amount, then rule, then credited rider.
pub fn check_earning(parcel: &Parcel, earning: &Earning) -> Result<Option<LedgerDiscrepancy>> {
    let (expected_amount, expected_rule) = delivery_payout(
        parcel.cost,
        &parcel.sender_region,
        &parcel.receiver_region,
    )?;

    let discrepancy = |kind| LedgerDiscrepancy {
        parcel_id: parcel.id,
        tracking_code: parcel.tracking_code.clone(),
        rider_email: parcel.assigned_rider_email.clone(),
        kind,
        expected_amount: Some(expected_amount),
        actual_amount: Some(earning.amount),
        detected_at: Utc::now(),
    };

    if earning.amount != expected_amount {
        return Ok(Some(discrepancy(DiscrepancyKind::AmountMismatch)));
    }

    if earning.rule != expected_rule {
        return Ok(Some(discrepancy(DiscrepancyKind::RuleMismatch)));
    }

    if parcel.assigned_rider_email.as_deref() != Some(earning.rider_email.as_str()) {
        return Ok(Some(discrepancy(DiscrepancyKind::RiderMismatch)));
    }

    Ok(None)
}

pub struct Reconciler {
    db: Arc<Database>,
}

impl Reconciler {
    pub fn new(db: Arc<Database>) -> Self {
        Reconciler { db }
    }

    /// Sweep for delivered parcels the ledger never recorded.
    ///
    /// A crash between the status write and the earning write leaves exactly
    /// this gap; the sweep makes it visible without repairing anything.
    pub async fn find_missing_earnings(&self, limit: i64) -> Result<Vec<LedgerDiscrepancy>> {
        let parcels = self.db.delivered_parcels_missing_earnings(limit).await?;

        if !parcels.is_empty() {
            warn!(
                "Found {} delivered parcel(s) with no ledger entry",
                parcels.len()
            );
        }

        let discrepancies = parcels
            .into_iter()
            .map(|parcel| {
                let expected_amount = match delivery_payout(
                    parcel.cost,
                    &parcel.sender_region,
                    &parcel.receiver_region,
                ) {
                    Ok((amount, _)) => Some(amount),
                    Err(e) => {
                        error!("Cannot recompute payout for parcel {}: {}", parcel.id, e);
                        None
                    }
                };

                LedgerDiscrepancy {
                    parcel_id: parcel.id,
                    tracking_code: parcel.tracking_code,
                    rider_email: parcel.assigned_rider_email,
                    kind: DiscrepancyKind::MissingEarning,
                    expected_amount,
                    actual_amount: None,
                    detected_at: Utc::now(),
                }
            })
            .collect();

        Ok(discrepancies)
    }

    /// Audit a single parcel's ledger entry.
    ///
    /// Undelivered parcels have nothing to audit and report clean.
    pub async fn audit_parcel(&self, parcel_id: Uuid) -> Result<Option<LedgerDiscrepancy>> {
        let parcel = self
            .db
            .get_parcel(parcel_id)
            .await?
            .ok_or(DispatchEngineError::ParcelNotFound(parcel_id))?;

        if !parcel.is_delivered() {
            return Ok(None);
        }

        match self.db.get_earning_for_parcel(parcel_id).await? {
            Some(earning) => check_earning(&parcel, &earning),
            None => Ok(Some(LedgerDiscrepancy {
                parcel_id: parcel.id,
                tracking_code: parcel.tracking_code,
                rider_email: parcel.assigned_rider_email,
                kind: DiscrepancyKind::MissingEarning,
                expected_amount: None,
                actual_amount: None,
                detected_at: Utc::now(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::{earning_for, DeliveryStatus, PaymentStatus};
    use rust_decimal_macros::dec;

    fn delivered_parcel() -> Parcel {
        let now = Utc::now();
        Parcel {
            id: Uuid::new_v4(),
            tracking_code: "PR-TEST123456".to_string(),
            title: "Ceramic mugs".to_string(),
            sender_region: "Dhaka".to_string(),
            receiver_region: "Dhaka".to_string(),
            cost: dec!(500),
            delivery_status: DeliveryStatus::Delivered,
            assigned_rider_name: Some("Rafi".to_string()),
            assigned_rider_email: Some("rafi@example.com".to_string()),
            payment_status: PaymentStatus::Paid,
            payment_transaction_id: Some("TXN-1".to_string()),
            created_by: "merchant@example.com".to_string(),
            created_at: now,
            assigned_at: Some(now),
            delivered_at: Some(now),
            updated_at: now,
        }
    }

    #[test]
    fn test_correct_earning_reports_clean() {
        let parcel = delivered_parcel();
        let earning = earning_for(&parcel, Utc::now()).unwrap();

        assert_eq!(check_earning(&parcel, &earning).unwrap(), None);
    }

    #[test]
    fn test_amount_drift_is_flagged() {
        let parcel = delivered_parcel();
        let mut earning = earning_for(&parcel, Utc::now()).unwrap();
        earning.amount += 1;

        let discrepancy = check_earning(&parcel, &earning).unwrap().unwrap();
        assert_eq!(discrepancy.kind, DiscrepancyKind::AmountMismatch);
        assert_eq!(discrepancy.expected_amount, Some(400));
        assert_eq!(discrepancy.actual_amount, Some(401));
    }

    #[test]
    fn test_rule_drift_is_flagged() {
        let parcel = delivered_parcel();
        let mut earning = earning_for(&parcel, Utc::now()).unwrap();
        // Same-region amount with the cross-region label
        earning.rule = parcel_core::EarningRule::CrossRegion;

        let discrepancy = check_earning(&parcel, &earning).unwrap().unwrap();
        assert_eq!(discrepancy.kind, DiscrepancyKind::RuleMismatch);
    }

    #[test]
    fn test_wrong_rider_is_flagged() {
        let parcel = delivered_parcel();
        let mut earning = earning_for(&parcel, Utc::now()).unwrap();
        earning.rider_email = "someone-else@example.com".to_string();

        let discrepancy = check_earning(&parcel, &earning).unwrap().unwrap();
        assert_eq!(discrepancy.kind, DiscrepancyKind::RiderMismatch);
    }
}
