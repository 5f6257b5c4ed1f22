use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use ulid::Ulid;

use crate::error::BookingError;

/// Everything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error("{0}")]
    BadRequest(String),
    #[error("space unavailable: {0}")]
    Space(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicting_ids: Option<&'a [Ulid]>,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Booking(e) => e.status_code(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Space(e) if e.kind() == std::io::ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ApiError::Space(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Booking(e) => e.code(),
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Space(e) if e.kind() == std::io::ErrorKind::InvalidInput => "invalid_space",
            ApiError::Space(_) => "space_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let conflicting_ids = match &self {
            ApiError::Booking(BookingError::Conflict(c)) => Some(c.conflicting_ids()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            conflicting_ids,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
