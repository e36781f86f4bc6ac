use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();

    info!(
        target: "reelgate::middleware",
        %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let started = Instant::now();
    let response = next.run(request).await;

    info!(
        target: "reelgate::middleware",
        %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
