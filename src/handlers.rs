use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::catalog::{CatalogSearch, Movie};
use crate::classifier::ClassifyRequest;
use crate::error::{iso8601, stamp_quota_headers, ApiError};
use crate::merge::merge_results;
use crate::rate_limiter::{Decision, RateLimiter};

/// Shared application state
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub limiter: RateLimiter,
    pub classifier: Arc<dyn ClassifyRequest>,
    pub catalog: Arc<dyn CatalogSearch>,
}

/// Merged discovery response. `total_results` deliberately reports the
/// primary query's total rather than the merged length, so upstream
/// pagination metadata stays meaningful.
#[derive(Debug, Serialize)]
pub struct DiscoverPayload {
    pub results: Vec<Movie>,
    pub total_results: u64,
}

/// Natural-language discovery endpoint, gated by the quota limiter.
///
/// The limiter decision happens strictly before classification, so a
/// request that later fails upstream has still consumed quota.
pub async fn discover(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let prompt = match body
        .get("prompt")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
    {
        Some(prompt) => prompt,
        None => return ApiError::Validation("Prompt is required".to_string()).into_response(),
    };

    let client_id = resolve_client_id(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    match state.limiter.check(&client_id, Utc::now()) {
        Decision::Denied(denial) => {
            tracing::info!(
                target: "reelgate::handlers",
                client_id = %client_id,
                retry_after_secs = denial.retry_after_secs,
                "daily quota exhausted"
            );
            ApiError::QuotaExceeded(denial).into_response()
        }
        Decision::Allowed(allowance) => {
            let mut response = match run_discovery(&state, prompt).await {
                Ok(payload) => Json(payload).into_response(),
                Err(err) => err.into_response(),
            };
            stamp_quota_headers(
                response.headers_mut(),
                allowance.limit,
                allowance.remaining,
                Some(allowance.reset_at),
            );
            response
        }
    }
}

async fn run_discovery(state: &AppState, prompt: &str) -> Result<DiscoverPayload, ApiError> {
    let filters = state.classifier.classify(prompt).await.map_err(|err| {
        tracing::error!(target: "reelgate::handlers", error = %err, "classification failed");
        ApiError::classification_failed()
    })?;

    let primary = state.catalog.discover(&filters).await.map_err(|err| {
        tracing::error!(target: "reelgate::handlers", error = %err, "catalog discovery failed");
        ApiError::catalog_failed()
    })?;

    // The keyword lookup is best-effort; when it fails the caller gets
    // the primary results with no error surfaced.
    let keyword = if filters.keywords.is_empty() {
        Vec::new()
    } else {
        match state
            .catalog
            .search_by_keywords(&filters.keywords, &filters)
            .await
        {
            Ok(results) => results,
            Err(err) => {
                tracing::warn!(
                    target: "reelgate::handlers",
                    error = %err,
                    "keyword search failed, returning primary results only"
                );
                Vec::new()
            }
        }
    };

    let total_results = primary.total_results;
    Ok(DiscoverPayload {
        results: merge_results(primary.results, keyword),
        total_results,
    })
}

/// Read-only quota report for the caller's own identifier. Uses the
/// limiter's inspection path only; it never consumes quota.
pub async fn quota_status(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let client_id = resolve_client_id(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let status = state.limiter.status(&client_id, Utc::now());

    let body = serde_json::json!({
        "limit": status.limit,
        "remaining": status.remaining,
        "resetAt": status.reset_at.map(iso8601),
    });
    let mut response = Json(body).into_response();
    stamp_quota_headers(
        response.headers_mut(),
        status.limit,
        status.remaining,
        status.reset_at,
    );
    response
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": iso8601(Utc::now()),
    }))
}

/// Derives the quota bucket key from the client's network address.
/// First non-empty candidate wins: forwarded header, real-ip header,
/// socket address, then the shared "unknown" bucket.
fn resolve_client_id(headers: &HeaderMap, socket_addr: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    match socket_addr {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_header_takes_precedence_and_uses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));

        assert_eq!(resolve_client_id(&headers, None), "192.168.1.1");
    }

    #[test]
    fn real_ip_header_is_the_second_candidate() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));

        assert_eq!(resolve_client_id(&headers, None), "203.0.113.1");
    }

    #[test]
    fn socket_address_is_used_when_no_headers_match() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "10.1.2.3:51511".parse().unwrap();

        assert_eq!(resolve_client_id(&headers, Some(addr)), "10.1.2.3");
    }

    #[test]
    fn empty_forwarded_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));

        assert_eq!(resolve_client_id(&headers, None), "unknown");
    }

    #[test]
    fn no_candidates_falls_back_to_unknown() {
        assert_eq!(resolve_client_id(&HeaderMap::new(), None), "unknown");
    }
}
