use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use service_core::middleware::headers::{HeaderReader, SITE_KEY_HEADER};

use super::keys::KeyRejection;
use super::tenant::resolve_tenant;
use crate::AppState;

/// Requires an `x-site-key` bound to the request's `x-tenant` on citizen
/// endpoints. Skipped entirely when no site keys are configured.
pub async fn site_key_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.site_keys.is_empty() {
        return Ok(next.run(request).await);
    }

    let tenant = resolve_tenant(&headers)?;
    match state
        .site_keys
        .authorize(headers.header(SITE_KEY_HEADER), &tenant)
    {
        Ok(()) => Ok(next.run(request).await),
        Err(KeyRejection::Unknown) => Err(AppError::Unauthorized(anyhow::anyhow!(
            "Site-Schlüssel fehlt oder ist ungültig"
        ))),
        Err(KeyRejection::TenantMismatch) => Err(AppError::Forbidden(anyhow::anyhow!(
            "Site-Schlüssel gehört zu einem anderen Mandanten"
        ))),
    }
}
