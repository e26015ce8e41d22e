//! HTTP request handlers.
//!
//! Pipelines run on the blocking pool so a slow script or gateway call never
//! stalls the runtime.

use axum::{
    Json,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::domain::config_validation::{backtest_settings, predict_settings};
use crate::domain::error::SiglabError;
use crate::pipeline::{self, BacktestOutcome, PredictOutcome};

use super::{AppState, ApiError};

/// `Json` body extractor whose rejections use the API's error body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BacktestRequest {
    pub code: String,
    pub instrument: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub name: String,
}

async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, SiglabError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ApiError::internal(format!("worker failed: {}", e)))?
        .map_err(ApiError::from)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<BacktestRequest>,
) -> Result<Json<BacktestOutcome>, ApiError> {
    if let Some(date) = &req.date {
        NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request(format!("invalid date '{}', expected YYYY-MM-DD", date)))?;
    }
    if req.instrument.as_deref().is_some_and(|i| i.trim().is_empty()) {
        return Err(ApiError::bad_request("instrument must not be empty"));
    }

    let settings = backtest_settings(&*state.config, req.instrument.as_deref(), req.date.as_deref())?;
    let gateway = Arc::clone(&state.gateway);
    let outcome = run_blocking(move || pipeline::backtest(&*gateway, &req.code, &settings)).await?;
    Ok(Json(outcome))
}

pub async fn run_predictions(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CodeRequest>,
) -> Result<Json<PredictOutcome>, ApiError> {
    let settings = predict_settings(&*state.config)?;
    let gateway = Arc::clone(&state.gateway);
    let outcome = run_blocking(move || {
        if settings.dry_run {
            pipeline::predict(&*gateway, &req.code, &settings)
        } else {
            pipeline::predict_and_submit(&*gateway, &req.code, &settings)
        }
    })
    .await?;
    Ok(Json(outcome))
}

pub async fn validate(ApiJson(req): ApiJson<CodeRequest>) -> Result<Json<ValidateResponse>, ApiError> {
    let name = run_blocking(move || pipeline::validate(&req.code)).await?;
    Ok(Json(ValidateResponse { name }))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("no such endpoint")
}
