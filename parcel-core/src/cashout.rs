//! FIFO cash-out planning
//!
//! A cash-out never splits an earning: the planner walks the rider's unpaid
//! earnings oldest-first and keeps including whole entries while any part of
//! the request is uncovered. The settled sum can therefore exceed the
//! request; the reported figures still follow the request arithmetic
//! (`paid = requested`, `remaining = total_before − requested`).

use crate::error::{Error, Result};
use crate::types::Earning;
use tracing::info;
use uuid::Uuid;

/// Selection computed by [`plan_cashout`], executed transactionally by the
/// storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashoutPlan {
    /// Earning IDs to mark paid, oldest first
    pub selected: Vec<Uuid>,

    /// Sum of the selected earnings; `>= requested`, may overshoot
    pub selected_total: i64,

    /// Rider's total unpaid balance before this cash-out
    pub total_unpaid: i64,

    /// Amount the rider asked for
    pub requested: i64,
}

impl CashoutPlan {
    /// Amount reported as paid out
    pub fn paid_amount(&self) -> i64 {
        self.requested
    }

    /// Unpaid balance reported after the cash-out
    pub fn remaining_unpaid(&self) -> i64 {
        self.total_unpaid - self.requested
    }
}

/// Plan a cash-out of `requested` against the rider's unpaid earnings.
///
/// `unpaid` is the rider's complete unpaid ledger slice; order does not
/// matter, the planner sorts by `(created_at, id)` itself. Fails with
/// `InvalidInput` for a non-positive request and `InsufficientFunds` when
/// the request exceeds the unpaid total (including the empty-ledger case).
pub fn plan_cashout(unpaid: &[Earning], requested: i64) -> Result<CashoutPlan> {
    if requested <= 0 {
        return Err(Error::InvalidInput(format!(
            "cash-out amount must be positive, got {}",
            requested
        )));
    }

    if let Some(paid) = unpaid.iter().find(|e| !e.is_unpaid()) {
        return Err(Error::InvariantViolation(format!(
            "earning {} is already paid and cannot be cashed out again",
            paid.id
        )));
    }

    let mut ordered: Vec<&Earning> = unpaid.iter().collect();
    ordered.sort_by_key(|e| (e.created_at, e.id));

    let mut total_unpaid: i64 = 0;
    for earning in &ordered {
        total_unpaid = total_unpaid.checked_add(earning.amount).ok_or_else(|| {
            Error::InvariantViolation("unpaid balance overflows i64".to_string())
        })?;
    }

    if requested > total_unpaid {
        return Err(Error::InsufficientFunds {
            requested,
            available: total_unpaid,
        });
    }

    let mut selected = Vec::new();
    let mut selected_total: i64 = 0;
    let mut remaining = requested;
    for earning in &ordered {
        if remaining <= 0 {
            break;
        }
        selected.push(earning.id);
        selected_total += earning.amount;
        remaining -= earning.amount;
    }

    info!(
        requested,
        total_unpaid,
        selected = selected.len(),
        selected_total,
        "planned cash-out"
    );

    Ok(CashoutPlan {
        selected,
        selected_total,
        total_unpaid,
        requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EarningRule, EarningStatus};
    use chrono::{Duration, Utc};

    fn earning(amount: i64, age_minutes: i64) -> Earning {
        Earning {
            id: Uuid::now_v7(),
            parcel_id: Uuid::new_v4(),
            rider_email: "rafi@example.com".to_string(),
            amount,
            rule: EarningRule::SameRegion,
            status: EarningStatus::Unpaid,
            created_at: Utc::now() - Duration::minutes(age_minutes),
            paid_at: None,
        }
    }

    #[test]
    fn test_partial_request_pays_whole_earnings() {
        // Unpaid 100, 200, 150 oldest-first; request 250 settles the first
        // two (300 total) and reports 250 paid, 200 remaining.
        let ledger = vec![earning(100, 30), earning(200, 20), earning(150, 10)];
        let plan = plan_cashout(&ledger, 250).unwrap();

        assert_eq!(plan.selected, vec![ledger[0].id, ledger[1].id]);
        assert_eq!(plan.selected_total, 300);
        assert_eq!(plan.paid_amount(), 250);
        assert_eq!(plan.remaining_unpaid(), 200);
    }

    #[test]
    fn test_exact_request_takes_exact_prefix() {
        let ledger = vec![earning(100, 30), earning(200, 20), earning(150, 10)];
        let plan = plan_cashout(&ledger, 300).unwrap();

        assert_eq!(plan.selected.len(), 2);
        assert_eq!(plan.selected_total, 300);
        assert_eq!(plan.remaining_unpaid(), 150);
    }

    #[test]
    fn test_full_balance_takes_everything() {
        let ledger = vec![earning(100, 30), earning(200, 20), earning(150, 10)];
        let plan = plan_cashout(&ledger, 450).unwrap();

        assert_eq!(plan.selected.len(), 3);
        assert_eq!(plan.selected_total, 450);
        assert_eq!(plan.remaining_unpaid(), 0);
    }

    #[test]
    fn test_small_request_overpays_single_earning() {
        let ledger = vec![earning(100, 30), earning(200, 20)];
        let plan = plan_cashout(&ledger, 50).unwrap();

        assert_eq!(plan.selected, vec![ledger[0].id]);
        assert_eq!(plan.selected_total, 100);
        assert_eq!(plan.paid_amount(), 50);
        assert_eq!(plan.remaining_unpaid(), 250);
    }

    #[test]
    fn test_selection_follows_created_at_not_input_order() {
        let newest = earning(150, 5);
        let oldest = earning(100, 60);
        let middle = earning(200, 30);
        let plan = plan_cashout(&[newest.clone(), oldest.clone(), middle.clone()], 250).unwrap();

        assert_eq!(plan.selected, vec![oldest.id, middle.id]);
    }

    #[test]
    fn test_overdraw_rejected_before_any_selection() {
        let ledger = vec![earning(100, 30), earning(200, 20)];
        let err = plan_cashout(&ledger, 301).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientFunds {
                requested: 301,
                available: 300
            }
        );
    }

    #[test]
    fn test_empty_ledger_is_insufficient() {
        let err = plan_cashout(&[], 1).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientFunds {
                requested: 1,
                available: 0
            }
        );
    }

    #[test]
    fn test_non_positive_request_rejected() {
        let ledger = vec![earning(100, 30)];
        assert!(matches!(
            plan_cashout(&ledger, 0).unwrap_err(),
            Error::InvalidInput(_)
        ));
        assert!(matches!(
            plan_cashout(&ledger, -5).unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[test]
    fn test_paid_entry_in_input_is_rejected() {
        let mut paid = earning(100, 30);
        paid.status = EarningStatus::Paid;
        paid.paid_at = Some(Utc::now());

        let err = plan_cashout(&[paid], 50).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }
}
