//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use yaks_core::YaksError;
use yaks_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient Yaks.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientBalance { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_balance",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            StoreError::InvalidAmount(amount) => {
                Self::BadRequest(format!("invalid amount: {amount}"))
            }
            StoreError::AlreadyApplied { feature_key } => {
                Self::Conflict(format!("feature already applied: {feature_key}"))
            }
            StoreError::NotOwner { transaction_id }
            | StoreError::NotRefundable { transaction_id } => {
                Self::BadRequest(format!("transaction {transaction_id} cannot be refunded"))
            }
            StoreError::AlreadyRefunded { transaction_id } => {
                Self::Conflict(format!("transaction {transaction_id} was already refunded"))
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<YaksError> for ApiError {
    fn from(err: YaksError) -> Self {
        match err {
            YaksError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            YaksError::FeatureNotFound { .. }
            | YaksError::RuleNotFound { .. }
            | YaksError::WalletNotFound { .. }
            | YaksError::TransactionNotFound { .. } => Self::NotFound(err.to_string()),
            YaksError::AlreadyApplied { .. } | YaksError::AlreadyRefunded { .. } => {
                Self::Conflict(err.to_string())
            }
            YaksError::InvalidAmount(_)
            | YaksError::MissingTarget { .. }
            | YaksError::NotOwner { .. }
            | YaksError::NotRefundable { .. }
            | YaksError::TrustLevelTooLow { .. }
            | YaksError::ContentTooShort { .. }
            | YaksError::DailyCapReached { .. }
            | YaksError::Disabled
            | YaksError::InvalidId(_) => Self::BadRequest(err.to_string()),
            YaksError::EffectApply(msg) | YaksError::Storage(msg) => Self::Internal(msg),
        }
    }
}
