//! Relay error types and their HTTP mapping.

use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::message::ErrorResponse;
use crate::services::completion::CompletionError;

pub const MESSAGE_REQUIRED: &str = "Message is required";
pub const INVALID_JSON: &str = "Invalid JSON body";
pub const PAYLOAD_TOO_LARGE: &str = "Message is too large";
pub const TOO_MANY_REQUESTS: &str = "Too many requests, please slow down.";
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong";

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    Upstream(#[from] CompletionError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            AppError::PayloadTooLarge => error_body(StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE),
            AppError::RateLimited { retry_after } => {
                let mut response = error_body(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS);
                // Round up so clients never retry a moment too early.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
                response
            }
            AppError::Upstream(err) => {
                tracing::error!(error = %err, "error talking to completion API");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, SOMETHING_WENT_WRONG)
            }
        }
    }
}

fn error_body(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}
