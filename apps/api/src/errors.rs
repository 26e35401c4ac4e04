use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::rate_limit::rate_limit_message;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Response bodies never carry internal error text.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Service disabled")]
    ServiceDisabled,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

const GENERIC_FAILURE: &str = "Internal Server Error. Please try again later.";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                rate_limit_message(std::time::Duration::from_secs(*retry_after_secs)),
            ),
            AppError::ServiceDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_DISABLED",
                "Server is currently closed by admin.".to_string(),
            ),
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    GENERIC_FAILURE.to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        match self {
            AppError::RateLimited { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation("Invalid action".into()), StatusCode::BAD_REQUEST),
            (AppError::RateLimited { retry_after_secs: 5 }, StatusCode::TOO_MANY_REQUESTS),
            (AppError::ServiceDisabled, StatusCode::SERVICE_UNAVAILABLE),
            (
                AppError::Llm(LlmError::Transport("socket closed".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after_header() {
        let response = AppError::RateLimited { retry_after_secs: 12 }.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
    }
}
