//! エラー型定義 (rsv-api)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rsv_core::FieldError;
use rsv_engine::EngineError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// rsv-api のエラー型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Core(#[from] rsv_core::Error),
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, ApiError>;

/// Generic API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

fn core_status(err: &rsv_core::Error) -> StatusCode {
    match err {
        rsv_core::Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        rsv_core::Error::SeriesNotFound(_) => StatusCode::NOT_FOUND,
        rsv_core::Error::SeriesExhausted(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Core(e) | Self::Engine(EngineError::Core(e)) => core_status(e),
            Self::Engine(EngineError::StalePreview(_) | EngineError::SeriesInactive(_)) => StatusCode::CONFLICT,
            Self::Engine(e) if e.is_check_failure() => StatusCode::BAD_GATEWAY,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn fields(&self) -> Vec<FieldError> {
        match self {
            Self::Core(e) | Self::Engine(EngineError::Core(e)) => e.field_errors().to_vec(),
            _ => Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            fields: self.fields(),
        };
        (status, Json(body)).into_response()
    }
}
