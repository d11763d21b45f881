//! HTTP request handlers for the web adapter.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::error::TradeStoreError;
use crate::domain::trade::{TradeSubmission, TradeView};
use crate::domain::validation::validate_submission;

use super::{AppState, WebError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishAck {
    pub status: &'static str,
    pub trade_id: String,
}

pub async fn health() -> &'static str {
    "ok"
}

/// Direct intake: validate, admit, and return the stored projection.
pub async fn submit_trade(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TradeSubmission>, JsonRejection>,
) -> Result<Json<TradeView>, WebError> {
    let Json(submission) = payload?;
    validate_submission(&submission)?;

    let admission = Arc::clone(&state.admission);
    let view = run_blocking(move || admission.admit(&submission)).await?;
    Ok(Json(view))
}

/// Queued intake: validate and hand off without waiting for persistence.
pub async fn publish_trade(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TradeSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishAck>), WebError> {
    let Json(submission) = payload?;
    validate_submission(&submission)?;

    let trade_id = submission.trade_id.clone();
    state.publisher.publish(submission)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishAck {
            status: "queued",
            trade_id,
        }),
    ))
}

pub async fn trade_history(
    State(state): State<Arc<AppState>>,
    Path(trade_id): Path<String>,
) -> Result<Json<Vec<TradeView>>, WebError> {
    let store = Arc::clone(&state.store);
    let lookup = trade_id.clone();
    let records = run_blocking(move || store.find_by_trade_id(&lookup)).await?;

    if records.is_empty() {
        return Err(WebError::not_found(format!("no trade with id {trade_id}")));
    }
    Ok(Json(records.iter().map(TradeView::from).collect()))
}

pub async fn not_found() -> WebError {
    WebError::not_found("no such route")
}

async fn run_blocking<T, F>(f: F) -> Result<T, WebError>
where
    F: FnOnce() -> Result<T, TradeStoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(WebError::from),
        Err(e) => {
            tracing::error!(error = %e, "blocking store task failed");
            Err(WebError::internal())
        }
    }
}
