//! Bearer token guard.
//!
//! The decoded token is returned to the handler as a [`Principal`] instead
//! of being stashed in request extensions.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use service_core::middleware::headers::{HeaderReader, TENANT_HEADER};

use crate::models::Role;
use crate::services::AccessTokenClaims;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct Principal(pub AccessTokenClaims);

impl Principal {
    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn tenant_id(&self) -> &str {
        &self.0.tenant_id
    }

    pub fn claims(&self) -> &AccessTokenClaims {
        &self.0
    }
}

fn unauthorized(message: &'static str) -> AppError {
    AppError::Unauthorized(anyhow::anyhow!(message))
}

/// Validate a bearer token against the request context at `now`.
pub fn authenticate<H: HeaderReader + ?Sized>(
    state: &AppState,
    headers: &H,
    now: DateTime<Utc>,
) -> Result<Principal, AppError> {
    let token = headers
        .bearer_token()
        .ok_or_else(|| unauthorized("Anmeldung erforderlich"))?;

    let claims = state.jwt.validate_access_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        unauthorized("Ungültiges oder abgelaufenes Token")
    })?;

    if claims.expires_at.is_some_and(|expires_at| expires_at <= now) {
        return Err(unauthorized("Gästezugang ist abgelaufen"));
    }

    // A token only speaks for the tenant it was issued in
    if let Some(requested) = headers.header(TENANT_HEADER) {
        if !requested.eq_ignore_ascii_case(&claims.tenant_id) {
            tracing::warn!(token_tenant = %claims.tenant_id, "Token presented for foreign tenant");
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Token gehört zu einem anderen Mandanten"
            )));
        }
    }

    Ok(Principal(claims))
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers, Utc::now())
    }
}
