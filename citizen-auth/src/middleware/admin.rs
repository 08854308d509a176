use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use service_core::middleware::headers::{HeaderReader, ADMIN_KEY_HEADER};

use super::tenant::resolve_tenant;
use crate::AppState;

/// Requires an `x-admin-key` bound to the request's `x-tenant`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bound_tenant = match headers
        .header(ADMIN_KEY_HEADER)
        .and_then(|key| state.admin_keys.tenant_for(key))
    {
        Some(tenant) => tenant.to_string(),
        None => {
            tracing::warn!("Failed admin authentication attempt");
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Admin-Schlüssel fehlt oder ist ungültig"
            )));
        }
    };

    let tenant = resolve_tenant(&headers)?;
    if bound_tenant != tenant.as_str() {
        tracing::warn!(tenant_id = %tenant.as_str(), "Admin key used for foreign tenant");
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Admin-Schlüssel gehört zu einem anderen Mandanten"
        )));
    }

    Ok(next.run(request).await)
}
