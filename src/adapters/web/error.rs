//! HTTP error responses for the web adapter.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::TradeStoreError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn malformed_json() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "MALFORMED_JSON",
            "Malformed JSON request",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An unexpected error occurred",
        )
    }
}

pub fn status_from_error(err: &TradeStoreError) -> (StatusCode, &'static str) {
    match err {
        TradeStoreError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
        TradeStoreError::PastMaturity { .. } => (StatusCode::BAD_REQUEST, "PAST_MATURITY"),
        TradeStoreError::StaleVersion { .. } => (StatusCode::BAD_REQUEST, "STALE_VERSION"),
        TradeStoreError::QueueUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_UNAVAILABLE")
        }
        TradeStoreError::RecordNotFound { .. }
        | TradeStoreError::Database { .. }
        | TradeStoreError::DatabaseQuery { .. }
        | TradeStoreError::ConfigParse { .. }
        | TradeStoreError::ConfigMissing { .. }
        | TradeStoreError::ConfigInvalid { .. }
        | TradeStoreError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl From<TradeStoreError> for WebError {
    fn from(err: TradeStoreError) -> Self {
        let (status, code) = status_from_error(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                return Self::internal();
            }
        }
        Self::new(status, code, err.to_string())
    }
}

impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        Self::malformed_json()
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
