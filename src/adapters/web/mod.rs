//! HTTP API adapter.
//!
//! JSON endpoints for backtesting, submitting and validating strategy code.

mod error;
mod handlers;

pub use error::{ApiError, status_from_error};
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::ports::config_port::ConfigPort;
use crate::ports::gateway_port::TradingGateway;

pub struct AppState {
    pub gateway: Arc<dyn TradingGateway + Send + Sync>,
    pub config: Arc<dyn ConfigPort + Send + Sync>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/backtest", post(handlers::run_backtest))
        .route("/predictions", post(handlers::run_predictions))
        .route("/validate", post(handlers::validate))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
