use axum::response::IntoResponse;

/// Prometheus scrape endpoint
pub async fn metrics() -> impl IntoResponse {
    crate::services::metrics::get_metrics()
}
