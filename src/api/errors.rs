use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::SessionError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    code: &'static str,
    detail: String,
}

/// API failure surface. Every variant carries a stable machine-readable code
/// so clients can branch without parsing the human-readable detail.
#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest { code: &'static str, detail: String },
    NotFound { code: &'static str, detail: String },
    Conflict { code: &'static str, detail: String },
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    pub(crate) fn validation(detail: String) -> Self {
        Self::BadRequest { code: "validation_error", detail }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ExamNotFound => {
                ApiError::NotFound { code: "exam_not_found", detail: err.to_string() }
            }
            SessionError::SubmissionNotFound => {
                ApiError::NotFound { code: "submission_not_found", detail: err.to_string() }
            }
            SessionError::UserNotFound => {
                ApiError::NotFound { code: "user_not_found", detail: err.to_string() }
            }
            SessionError::Forbidden => ApiError::Forbidden("Access denied"),
            SessionError::WindowNotOpen => {
                ApiError::BadRequest { code: "window_not_open", detail: err.to_string() }
            }
            SessionError::WindowClosed => {
                ApiError::BadRequest { code: "window_closed", detail: err.to_string() }
            }
            SessionError::AlreadySubmitted => {
                ApiError::Conflict { code: "already_submitted", detail: err.to_string() }
            }
            SessionError::TimeExpired => {
                ApiError::Conflict { code: "time_expired", detail: err.to_string() }
            }
            SessionError::Store(store_err) => {
                ApiError::internal(store_err, "Storage operation failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let status = StatusCode::UNAUTHORIZED;
                let mut response = (
                    status,
                    Json(ErrorResponse {
                        status: status.as_u16(),
                        code: "unauthorized",
                        detail: message.to_string(),
                    }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => {
                let status = StatusCode::FORBIDDEN;
                (
                    status,
                    Json(ErrorResponse {
                        status: status.as_u16(),
                        code: "forbidden",
                        detail: message.to_string(),
                    }),
                )
                    .into_response()
            }
            ApiError::BadRequest { code, detail } => {
                let status = StatusCode::BAD_REQUEST;
                (status, Json(ErrorResponse { status: status.as_u16(), code, detail }))
                    .into_response()
            }
            ApiError::NotFound { code, detail } => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse { status: status.as_u16(), code, detail }))
                    .into_response()
            }
            ApiError::Conflict { code, detail } => {
                let status = StatusCode::CONFLICT;
                (status, Json(ErrorResponse { status: status.as_u16(), code, detail }))
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (
                    status,
                    Json(ErrorResponse {
                        status: status.as_u16(),
                        code: "internal_error",
                        detail: message,
                    }),
                )
                    .into_response()
            }
        }
    }
}
