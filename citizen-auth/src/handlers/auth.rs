use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{ActivateRequest, LoginRequest, LogoutRequest, MeResponse, OkResponse, RefreshRequest},
    middleware::{ClientIp, Principal, Tenant},
    utils::ValidatedJson,
    AppState,
};

/// Activate a resident account with a printed activation code
#[utoipa::path(
    post,
    path = "/api/auth/activate",
    request_body = ActivateRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 201, description = "Account activated", body = AuthResponse),
        (status = 400, description = "Invalid input or account already exists", body = ErrorResponse),
        (status = 401, description = "Unknown activation code", body = ErrorResponse),
        (status = 403, description = "Code revoked, used or expired, or address mismatch", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("site_key" = []))
)]
pub async fn activate(
    State(state): State<AppState>,
    tenant: Tenant,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<ActivateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .auth_service
        .activate(tenant.as_str(), &req, &ip)
        .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("site_key" = []))
)]
pub async fn login(
    State(state): State<AppState>,
    tenant: Tenant,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth_service.login(tenant.as_str(), &req, &ip).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Token refreshed", body = TokenPairResponse),
        (status = 401, description = "Invalid, revoked or expired refresh token", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("site_key" = []))
)]
pub async fn refresh(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .auth_service
        .refresh(tenant.as_str(), &req.refresh_token)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Revoke a refresh token. Always succeeds.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = LogoutRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Logged out", body = OkResponse)
    ),
    tag = "Authentication",
    security(("site_key" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    tenant: Tenant,
    body: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    if let Err(e) = state
        .auth_service
        .logout(tenant.as_str(), &req.refresh_token)
        .await
    {
        tracing::error!(error = %e, "Logout failed");
    }
    (StatusCode::OK, Json(OkResponse { ok: true }))
}

/// Decoded principal of the bearer token
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current principal", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Token belongs to another tenant", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn me(principal: Principal) -> Json<MeResponse> {
    Json(MeResponse::from(principal.0))
}
