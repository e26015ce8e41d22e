//! JSON error responses for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::domain::error::SiglabError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub kind: &'static str,
    pub position: Option<usize>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<usize>,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            kind,
            position: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "request", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

pub fn status_from_error(err: &SiglabError) -> StatusCode {
    match err {
        SiglabError::Compilation(_) | SiglabError::Loader { .. } | SiglabError::Prediction { .. } => {
            StatusCode::BAD_REQUEST
        }
        SiglabError::NoInstrument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SiglabError::Gateway { .. }
        | SiglabError::ConfigParse { .. }
        | SiglabError::ConfigMissing { .. }
        | SiglabError::ConfigInvalid { .. }
        | SiglabError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SiglabError> for ApiError {
    fn from(err: SiglabError) -> Self {
        let status = status_from_error(&err);
        if err.is_user_error() {
            tracing::debug!(kind = err.kind(), "request rejected: {}", err);
        } else {
            tracing::error!(kind = err.kind(), "request failed: {}", err);
        }
        let position = match &err {
            SiglabError::Compilation(pe) => Some(pe.position),
            _ => None,
        };
        Self {
            status,
            message: err.to_string(),
            kind: err.kind(),
            position,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            kind: self.kind,
            position: self.position,
        };
        (self.status, Json(body)).into_response()
    }
}
