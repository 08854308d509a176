use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::admin::{GenerateTouristCodesRequest, GenerateTouristCodesResponse, TouristCodeListQuery},
    dtos::tourist::TouristCodeView,
    middleware::Tenant,
    models::TouristCodeStatus,
    services::TouristCodeFilter,
    utils::ValidatedJson,
    AppState,
};

/// Generate a batch of tourist access codes
#[utoipa::path(
    post,
    path = "/api/admin/tourist-codes/generate",
    request_body = GenerateTouristCodesRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 201, description = "Codes generated, plaintext shown once", body = GenerateTouristCodesResponse),
        (status = 400, description = "Duration not 7, 14 or 30, or amount out of range", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn generate_tourist_codes(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(req): ValidatedJson<GenerateTouristCodesRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generated = state
        .tourist_service
        .generate_codes(tenant.as_str(), req.duration_days, req.amount)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GenerateTouristCodesResponse {
            codes: generated.codes,
            duration_days: generated.duration_days.days(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/tourist-codes",
    params(
        ("x-tenant" = String, Header, description = "Tenant id"),
        TouristCodeListQuery
    ),
    responses(
        (status = 200, description = "Tourist codes, newest first", body = [TouristCodeView]),
        (status = 400, description = "Unknown status filter", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn list_tourist_codes(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(query): Query<TouristCodeListQuery>,
) -> Result<Json<Vec<TouristCodeView>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<TouristCodeStatus>)
        .transpose()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let filter = TouristCodeFilter {
        status,
        duration_days: query.duration_days,
    };
    let codes = state
        .tourist_service
        .list_codes(tenant.as_str(), &filter)
        .await?;

    Ok(Json(codes.into_iter().map(TouristCodeView::from).collect()))
}

/// Revoke an unredeemed tourist code
#[utoipa::path(
    post,
    path = "/api/admin/tourist-codes/{code_id}/revoke",
    params(
        ("x-tenant" = String, Header, description = "Tenant id"),
        ("code_id" = String, Path, description = "Tourist code id")
    ),
    responses(
        (status = 200, description = "Code revoked", body = TouristCodeView),
        (status = 404, description = "Code not found", body = ErrorResponse),
        (status = 409, description = "Code already redeemed", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn revoke_tourist_code(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(code_id): Path<String>,
) -> Result<Json<TouristCodeView>, AppError> {
    let code = state
        .tourist_service
        .revoke(tenant.as_str(), &code_id)
        .await?;
    Ok(Json(code.into()))
}
