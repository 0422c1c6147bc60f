use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;

use crate::context::RequestContext;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Builds the [`RequestContext`] for each request, logs request/response lines inside a
/// span carrying the correlation id, and echoes the id back on the response.
pub async fn request_context_middleware(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| RequestContext::generate().correlation_id);

    let retry_count = req
        .headers()
        .get(RETRY_COUNT_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0);

    let ctx = RequestContext::new(correlation_id.clone(), retry_count);
    req.extensions_mut().insert(ctx);

    let method = req.method().clone();
    let uri = req.uri().clone();
    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();
        tracing::info!(retry_count, "Incoming request");

        let mut response = next.run(req).await;

        tracing::info!(
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Outgoing response"
        );

        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
        }
        response
    }
    .instrument(span)
    .await
}
