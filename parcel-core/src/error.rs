//! Error types for the parcel domain

use thiserror::Error;

/// Result type for domain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Domain errors
///
/// Only outcomes the lifecycle rules themselves can produce live here.
/// Infrastructure concerns (missing rows, storage failures, bad tokens)
/// belong to the service layer wrapping this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed or out-of-range input (empty fields, non-positive amounts)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Acting identity is not the rider assigned to the parcel
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested transition is not reachable from the current status
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Requested cash-out exceeds the rider's unpaid balance
    #[error("Insufficient funds: requested {requested}, unpaid {available}")]
    InsufficientFunds {
        /// Amount the rider asked to withdraw
        requested: i64,
        /// Total unpaid balance at the time of the request
        available: i64,
    },

    /// Entity state violates a structural invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Stable machine-readable tag for this error class
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::Forbidden(_) => "forbidden",
            Error::InvalidStatus(_) => "invalid_status",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::InvariantViolation(_) => "invariant_violation",
        }
    }
}
