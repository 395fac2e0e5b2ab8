use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::pipeline::PipelineError;
use crate::sync::SyncError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            detail: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(value: PipelineError) -> Self {
        match value {
            PipelineError::Unauthorized(_) => ApiError::Unauthorized(value.to_string()),
            PipelineError::InvalidPayload(_) => ApiError::InvalidPayload(value.to_string()),
            PipelineError::JobCreation(_)
            | PipelineError::Processing(_)
            | PipelineError::Aborted(_) => ApiError::Internal(value.to_string()),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::InvalidParams(_) => ApiError::InvalidPayload(value.to_string()),
            SyncError::Auth(_) | SyncError::Fetch(_) | SyncError::Ledger(_) => {
                ApiError::Internal(value.to_string())
            }
        }
    }
}
