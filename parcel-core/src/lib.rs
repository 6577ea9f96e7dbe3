//! ParcelRail Core
//!
//! Domain logic for parcel delivery coordination: the delivery state
//! machine, the rider earnings computation, and FIFO cash-out planning.
//!
//! # Architecture
//!
//! - **Pure planners**: Every decision (transition, payout, cash-out
//!   selection) is computed from values, then executed by a storage layer
//! - **Forward-only lifecycle**: `not_collected → rider_assigned →
//!   in_transit → delivered`, never backwards
//! - **Append-only earnings**: One ledger entry per delivered parcel;
//!   entries flip `unpaid → paid` and are never deleted
//!
//! # Invariants
//!
//! - Exactly one earning per delivered parcel
//! - Recorded amounts equal recomputation from the parcel
//! - Cash-outs settle whole earnings, oldest first
//! - Only the assigned rider advances a parcel

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod cashout;
pub mod earnings;
pub mod error;
pub mod transition;
pub mod types;

// Re-exports
pub use cashout::{plan_cashout, CashoutPlan};
pub use earnings::{delivery_payout, earning_for};
pub use error::{Error, Result};
pub use transition::{ensure_assignable, plan_advance, AdvanceAction};
pub use types::{
    DeliveryStatus, Earning, EarningRule, EarningStatus, Parcel, PaymentStatus, Rider,
    RiderStatus, RiderWorkStatus,
};
