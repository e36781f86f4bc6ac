use crate::rate_limiter::Denial;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Request-path errors, mapped straight to HTTP responses.
///
/// Quota denial is a normal decision outcome dressed as an error so
/// handlers can use `?`; upstream failures keep their detailed cause in
/// the logs and expose only a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{}", .0.message)]
    QuotaExceeded(Denial),
    #[error("upstream request failed")]
    Upstream { user_message: &'static str },
}

impl ApiError {
    pub fn classification_failed() -> Self {
        Self::Upstream {
            user_message: "Failed to parse your request. Please try rephrasing.",
        }
    }

    pub fn catalog_failed() -> Self {
        Self::Upstream {
            user_message: "Failed to search movies. Please try again.",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            ApiError::QuotaExceeded(denial) => {
                let body = serde_json::json!({
                    "error": "Rate limit exceeded",
                    "message": denial.message,
                    "limit": denial.limit,
                    "resetAt": iso8601(denial.reset_at),
                    "retryAfter": denial.retry_after_secs,
                });
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                stamp_quota_headers(
                    response.headers_mut(),
                    denial.limit,
                    0,
                    Some(denial.reset_at),
                );
                response
                    .headers_mut()
                    .insert("retry-after", HeaderValue::from(denial.retry_after_secs));
                response
            }
            ApiError::Upstream { user_message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": user_message })),
            )
                .into_response(),
        }
    }
}

/// Adds the `X-RateLimit-*` headers every rate-limited response carries.
pub(crate) fn stamp_quota_headers(
    headers: &mut HeaderMap,
    limit: u32,
    remaining: u32,
    reset_at: Option<DateTime<Utc>>,
) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    if let Some(reset_at) = reset_at {
        if let Ok(value) = HeaderValue::from_str(&iso8601(reset_at)) {
            headers.insert("x-ratelimit-reset", value);
        }
    }
}

pub(crate) fn iso8601(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
