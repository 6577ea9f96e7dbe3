use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchEngineError>;

#[derive(Error, Debug)]
pub enum DispatchEngineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("NATS error: {0}")]
    Nats(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parcel not found: {0}")]
    ParcelNotFound(uuid::Uuid),

    #[error("Rider not found: {0}")]
    RiderNotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Insufficient funds: requested {requested}, unpaid {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Parcel assigned but rider update failed: {0}")]
    AssignmentIncomplete(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<parcel_core::Error> for DispatchEngineError {
    fn from(err: parcel_core::Error) -> Self {
        match err {
            parcel_core::Error::InvalidInput(msg) => DispatchEngineError::Validation(msg),
            parcel_core::Error::Forbidden(msg) => DispatchEngineError::Forbidden(msg),
            parcel_core::Error::InvalidStatus(msg) => DispatchEngineError::InvalidStatus(msg),
            parcel_core::Error::InsufficientFunds {
                requested,
                available,
            } => DispatchEngineError::InsufficientFunds {
                requested,
                available,
            },
            parcel_core::Error::InvariantViolation(msg) => DispatchEngineError::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for DispatchEngineError {
    fn from(err: serde_json::Error) -> Self {
        DispatchEngineError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl From<async_nats::PublishError> for DispatchEngineError {
    fn from(err: async_nats::PublishError) -> Self {
        DispatchEngineError::Nats(format!("NATS publish error: {}", err))
    }
}

impl ResponseError for DispatchEngineError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            DispatchEngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchEngineError::Redis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchEngineError::Nats(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchEngineError::Validation(_) => StatusCode::BAD_REQUEST,
            DispatchEngineError::ParcelNotFound(_) => StatusCode::NOT_FOUND,
            DispatchEngineError::RiderNotFound(_) => StatusCode::NOT_FOUND,
            DispatchEngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            DispatchEngineError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            DispatchEngineError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchEngineError::Duplicate(_) => StatusCode::CONFLICT,
            DispatchEngineError::Conflict(_) => StatusCode::CONFLICT,
            DispatchEngineError::AssignmentIncomplete(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchEngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            DispatchEngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl DispatchEngineError {
    pub fn error_type(&self) -> &str {
        match self {
            DispatchEngineError::Database(_) => "database_error",
            DispatchEngineError::Redis(_) => "cache_error",
            DispatchEngineError::Nats(_) => "messaging_error",
            DispatchEngineError::Validation(_) => "validation_error",
            DispatchEngineError::ParcelNotFound(_) => "not_found",
            DispatchEngineError::RiderNotFound(_) => "not_found",
            DispatchEngineError::Forbidden(_) => "forbidden",
            DispatchEngineError::InvalidStatus(_) => "invalid_status",
            DispatchEngineError::InsufficientFunds { .. } => "insufficient_funds",
            DispatchEngineError::Duplicate(_) => "duplicate_error",
            DispatchEngineError::Conflict(_) => "conflict",
            DispatchEngineError::AssignmentIncomplete(_) => "assignment_incomplete",
            DispatchEngineError::Unauthorized => "unauthorized",
            DispatchEngineError::Internal(_) => "internal_error",
        }
    }
}
