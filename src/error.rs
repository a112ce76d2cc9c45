use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("outside service area: {0}")]
    OutOfServiceArea(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("distance unavailable: {0}")]
    DistanceUnavailable(String),

    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    #[error("no driver available for order {0}")]
    NoDriverAvailable(String),

    #[error("assignment conflict: {0}")]
    AssignmentConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCoordinate(_) => "invalid_coordinate",
            AppError::OutOfServiceArea(_) => "out_of_service_area",
            AppError::LimitExceeded(_) => "limit_exceeded",
            AppError::DistanceUnavailable(_) => "distance_unavailable",
            AppError::IllegalTransition(_) => "illegal_transition",
            AppError::NoDriverAvailable(_) => "no_driver_available",
            AppError::AssignmentConflict(_) => "assignment_conflict",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Forbidden(_) => "forbidden",
            AppError::Internal(_) => "internal",
        }
    }

    /// Only a lost optimistic-concurrency race is worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::AssignmentConflict(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCoordinate(_)
            | AppError::LimitExceeded(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::OutOfServiceArea(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DistanceUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::IllegalTransition(_) | AppError::AssignmentConflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::NoDriverAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
            "retryable": self.is_retryable(),
        }));

        (status, body).into_response()
    }
}
