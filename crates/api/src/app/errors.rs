//! Error responses. Every failure is rendered as the standard envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use forgepos_infra::DispatchError;

use crate::app::dto::Envelope;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn headline(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation failed",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Unprocessable(_) => "rule violated",
            ApiError::Internal(_) => "internal error",
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(msg) => ApiError::BadRequest(msg),
            DispatchError::InvariantViolation(msg) => ApiError::Unprocessable(msg),
            e @ DispatchError::NotFound(_) => ApiError::NotFound(e.to_string()),
            DispatchError::Conflict(msg) => ApiError::Conflict(msg),
            e @ DispatchError::Concurrency(_) => ApiError::Conflict(e.to_string()),
            DispatchError::Forbidden(msg) => ApiError::Forbidden(msg),
            DispatchError::TenantIsolation(msg) => {
                tracing::error!(error = %msg, "tenant isolation violation");
                ApiError::Forbidden("tenant isolation violation".to_string())
            }
            e @ (DispatchError::Deserialize(_) | DispatchError::Store(_)) => {
                tracing::error!(error = %e, "request failed in the store layer");
                ApiError::Internal("the event store could not complete the request".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()>::error(self.headline(), vec![self.to_string()]);
        (self.status(), axum::Json(body)).into_response()
    }
}
