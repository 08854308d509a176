use axum::{extract::State, Json};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::AppState;

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Data directory unavailable")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let data_dir = &state.config.storage.data_dir;
    tokio::fs::metadata(data_dir).await.map_err(|e| {
        tracing::error!(error = %e, path = %data_dir.display(), "Data directory check failed");
        AppError::InternalError(anyhow::anyhow!("Data directory unavailable: {}", e))
    })?;

    Ok(Json(json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "storage": "up"
        }
    })))
}
