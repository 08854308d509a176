use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::tourist::RedeemRequest,
    middleware::{ClientIp, Tenant},
    utils::ValidatedJson,
    AppState,
};

/// Redeem a tourist access code on a device
#[utoipa::path(
    post,
    path = "/api/tourist/redeem",
    request_body = RedeemRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Tourist session opened", body = TouristSessionResponse),
        (status = 400, description = "Malformed code or device id", body = ErrorResponse),
        (status = 404, description = "Unknown code", body = ErrorResponse),
        (status = 409, description = "Code already redeemed or revoked", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Tourist",
    security(("site_key" = []))
)]
pub async fn redeem(
    State(state): State<AppState>,
    tenant: Tenant,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<RedeemRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .tourist_service
        .redeem(tenant.as_str(), &req.code, &req.device_id, &ip)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}
