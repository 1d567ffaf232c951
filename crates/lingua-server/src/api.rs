//! Shared API error type for the lingua server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("payment required: {0}")]
    PaymentRequired(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("upstream service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<lingua_threads::ThreadError> for ApiError {
    fn from(e: lingua_threads::ThreadError) -> Self {
        match e {
            lingua_threads::ThreadError::ThreadNotFound(id) => {
                ApiError::NotFound(format!("thread not found: {id}"))
            }
            lingua_threads::ThreadError::MessageNotFound(id) => {
                ApiError::NotFound(format!("message not found: {id}"))
            }
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

impl From<lingua_credits::CreditsError> for ApiError {
    fn from(e: lingua_credits::CreditsError) -> Self {
        match e {
            lingua_credits::CreditsError::AccountNotFound(id) => {
                ApiError::NotFound(format!("no credits account for user: {id}"))
            }
            lingua_credits::CreditsError::InsufficientCredits { .. } => {
                ApiError::PaymentRequired("INSUFFICIENT_CREDITS".to_string())
            }
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

impl From<lingua_stats::StatsError> for ApiError {
    fn from(e: lingua_stats::StatsError) -> Self {
        ApiError::InternalServerError(e.to_string())
    }
}

impl From<lingua_observe::ObserveError> for ApiError {
    fn from(e: lingua_observe::ObserveError) -> Self {
        ApiError::InternalServerError(e.to_string())
    }
}

/// Shorthand for pool/`spawn_blocking` plumbing failures in handlers.
pub(crate) fn internal<E: std::fmt::Display>(e: E) -> ApiError {
    ApiError::InternalServerError(e.to_string())
}
