use axum::http::{HeaderValue, Request};
use axum::{extract::Request as AxumRequest, middleware::Next, response::Response};
use tracing::Span;

use super::headers::{HeaderReader, TENANT_HEADER};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reuse the caller's `x-request-id` or mint one, and echo it on the response.
pub async fn request_id_middleware(mut req: AxumRequest, next: Next) -> Response {
    let request_id = req
        .headers()
        .header(REQUEST_ID_HEADER)
        .filter(|s| s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Span factory for `TraceLayer::make_span_with`.
///
/// The tenant header is recorded so log lines can be filtered per municipality.
pub fn make_request_span<B>(request: &Request<B>) -> Span {
    let header = |name: &str| request.headers().header(name).unwrap_or("-").to_string();

    tracing::info_span!(
        "http_request",
        request_id = %header(REQUEST_ID_HEADER),
        tenant = %header(TENANT_HEADER),
        method = %request.method(),
        uri = %request.uri().path(),
        version = ?request.version(),
    )
}
