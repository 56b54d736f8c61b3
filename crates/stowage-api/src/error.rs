//! API error handling
//!
//! Maps [`StowError`] kinds onto HTTP responses with a JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stowage_core::StowError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    NotFound { resource: &'static str, id: String },
    /// Missing or invalid request input, reported as not found
    Validation(String),
    Unprocessable(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } | ApiError::Validation(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StowError> for ApiError {
    fn from(err: StowError) -> Self {
        match err {
            StowError::Validation(msg) => ApiError::Validation(msg),
            StowError::NotFound { entity, id } => ApiError::NotFound {
                resource: entity,
                id,
            },
            StowError::Decode(_) | StowError::Encode(_) => ApiError::Unprocessable(err.to_string()),
            StowError::Storage(_) | StowError::Config(_) => ApiError::Internal(err.to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_identifier: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::NotFound { resource, id } => ErrorBody {
                error_identifier: "not_found",
                message: format!("{resource} not found: {id}"),
            },
            ApiError::Validation(message) => ErrorBody {
                error_identifier: "validation_failed",
                message,
            },
            ApiError::Unprocessable(message) => ErrorBody {
                error_identifier: "unprocessable",
                message,
            },
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Request failed");
                ErrorBody {
                    error_identifier: "internal_error",
                    message: "Internal server error".to_string(),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
