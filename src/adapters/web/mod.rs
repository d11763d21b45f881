//! Web server adapter.
//!
//! JSON API over axum for direct and queued trade intake.

mod error;
mod handlers;

pub use error::{WebError, status_from_error};
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::domain::admission::{SharedStore, TradeAdmission};
use crate::ports::publisher_port::TradePublisherPort;

pub struct AppState {
    pub admission: Arc<TradeAdmission>,
    pub publisher: Arc<dyn TradePublisherPort + Send + Sync>,
    pub store: SharedStore,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/trades", post(handlers::submit_trade))
        .route("/api/trades/publish", post(handlers::publish_trade))
        .route("/api/trades/{trade_id}", get(handlers::trade_history))
        .fallback(handlers::not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(Arc::new(state))
}
