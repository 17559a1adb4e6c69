use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde_json::json;

use crate::models::WalletError;

/// Service-level error, rendered as `{error, statuscode, details?}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Insufficient funds")]
    InsufficientFunds { available: Decimal, required: Decimal },
    #[error("Insufficient reserved funds")]
    InsufficientReserved { reserved: Decimal, required: Decimal },
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn statuscode(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            ApiError::InsufficientReserved { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::InsufficientFunds {
                available,
                required,
            } => Some(json!({
                "available": available.to_string(),
                "required": required.to_string(),
            })),
            ApiError::InsufficientReserved { reserved, required } => Some(json!({
                "reserved": reserved.to_string(),
                "required": required.to_string(),
            })),
            _ => None,
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NonPositiveAmount => {
                ApiError::BadRequest("Amount must be positive".into())
            }
            WalletError::InsufficientFunds {
                available,
                required,
            } => ApiError::InsufficientFunds {
                available,
                required,
            },
            WalletError::InsufficientReserved { reserved, required } => {
                ApiError::InsufficientReserved { reserved, required }
            }
            WalletError::Database(e) => ApiError::Database(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.statuscode();
        if status.is_server_error() {
            tracing::error!("request failed: {self:?}");
        }

        let mut body = json!({
            "error": self.to_string(),
            "statuscode": status.as_u16(),
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
