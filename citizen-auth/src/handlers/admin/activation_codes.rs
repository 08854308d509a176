use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use service_core::error::AppError;

use crate::{
    dtos::admin::{ActivationCodeResponse, CreateActivationCodeRequest},
    middleware::Tenant,
    utils::ValidatedJson,
    AppState,
};

/// Issue an activation code for a resident. Earlier active codes are revoked.
#[utoipa::path(
    post,
    path = "/api/admin/activation-codes",
    request_body = CreateActivationCodeRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 201, description = "Code issued, plaintext shown once", body = ActivationCodeResponse),
        (status = 400, description = "Invalid expiry", body = ErrorResponse),
        (status = 404, description = "Resident not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn create_activation_code(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(req): ValidatedJson<CreateActivationCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let resident = state
        .residents
        .get_by_id(tenant.as_str(), req.resident_id.trim())
        .await?;

    let days = req
        .expires_in_days
        .unwrap_or(state.config.activation.code_expiry_days);
    let expires_at = Duration::try_days(days)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Ungültige Gültigkeitsdauer")))?;

    let issued = state
        .activation
        .create_code(tenant.as_str(), &resident.id, expires_at)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ActivationCodeResponse {
            resident_id: resident.id,
            code: issued.code,
            expires_at: issued.activation.expires_at,
        }),
    ))
}
