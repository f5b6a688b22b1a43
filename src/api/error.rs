//! Mapping from domain errors to HTTP responses.
//!
//! Every failure leaves the API as
//! `{"error": {"code": "...", "message": "...", "reason": "..."}}` where `reason`
//! is only present for unavailable deals.

use crate::errors::{Error, UnavailableReason};
use axum::{
    Json,
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use validator::ValidationErrors;

/// An error ready to be rendered as an HTTP response.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    reason: Option<UnavailableReason>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            reason: None,
        }
    }

    /// Malformed request body, query or path.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Bad request: {}", msg);
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    /// Missing or malformed caller identity.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Unauthorized: {}", msg);
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
    }

    /// Anything the caller cannot fix. The detail is logged, not returned.
    pub fn internal(msg: impl Into<String>) -> Self {
        tracing::error!("Internal error: {}", msg.into());
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation { message } => {
                Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            }
            Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
            Error::Authorization { message } => {
                tracing::warn!("Forbidden: {}", message);
                Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
            }
            Error::DealUnavailable { reason, .. } => Self {
                reason: Some(reason),
                ..Self::new(StatusCode::CONFLICT, "DEAL_UNAVAILABLE", err.to_string())
            },
            Error::DuplicateClaim { .. } => {
                Self::new(StatusCode::CONFLICT, "DUPLICATE_CLAIM", err.to_string())
            }
            Error::DuplicateSave { .. } => {
                Self::new(StatusCode::CONFLICT, "DUPLICATE_SAVE", err.to_string())
            }
            Error::ConcurrencyConflict { .. } => {
                Self::new(StatusCode::CONFLICT, "CONCURRENCY_CONFLICT", err.to_string())
            }
            Error::Config { .. } | Error::Database(_) | Error::Io(_) => {
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            errors.to_string().replace('\n', "; "),
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorEnvelope<'a> {
            error: ErrorBody<'a>,
        }

        #[derive(Serialize)]
        struct ErrorBody<'a> {
            code: &'a str,
            message: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<UnavailableReason>,
        }

        (
            self.status,
            Json(ErrorEnvelope {
                error: ErrorBody {
                    code: self.code,
                    message: &self.message,
                    reason: self.reason,
                },
            }),
        )
            .into_response()
    }
}

/// Result type returned by handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
