use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::admin::{
        ActivationCodeStatusResponse, CreateResidentRequest, CreateResidentResponse,
        ImportResidentsRequest, UpdateResidentRequest,
    },
    middleware::Tenant,
    models::{NewResident, Resident},
    services::UpsertOutcome,
    utils::ValidatedJson,
    AppState,
};

/// Register a resident, or refresh the name of the resident at the same address
#[utoipa::path(
    post,
    path = "/api/admin/residents",
    request_body = CreateResidentRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 201, description = "Resident created", body = CreateResidentResponse),
        (status = 200, description = "Existing resident updated", body = CreateResidentResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 401, description = "Invalid admin key", body = ErrorResponse),
        (status = 403, description = "Admin key bound to another tenant", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn create_resident(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(req): ValidatedJson<CreateResidentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (resident, outcome) = state
        .residents
        .upsert_resident(tenant.as_str(), NewResident::from(req))
        .await?;

    let status = match outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Updated => StatusCode::OK,
    };
    Ok((
        status,
        Json(CreateResidentResponse {
            resident_id: resident.id,
            created: outcome == UpsertOutcome::Created,
        }),
    ))
}

/// List residents
#[utoipa::path(
    get,
    path = "/api/admin/residents",
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Residents of the tenant", body = [Resident])
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn list_residents(
    State(state): State<AppState>,
    tenant: Tenant,
) -> Result<Json<Vec<Resident>>, AppError> {
    Ok(Json(state.residents.list(tenant.as_str()).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/residents/{resident_id}",
    params(
        ("x-tenant" = String, Header, description = "Tenant id"),
        ("resident_id" = String, Path, description = "Resident id")
    ),
    responses(
        (status = 200, description = "Resident", body = Resident),
        (status = 404, description = "Resident not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn get_resident(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(resident_id): Path<String>,
) -> Result<Json<Resident>, AppError> {
    Ok(Json(
        state
            .residents
            .get_by_id(tenant.as_str(), &resident_id)
            .await?,
    ))
}

/// Partially update a resident, including its status
#[utoipa::path(
    patch,
    path = "/api/admin/residents/{resident_id}",
    request_body = UpdateResidentRequest,
    params(
        ("x-tenant" = String, Header, description = "Tenant id"),
        ("resident_id" = String, Path, description = "Resident id")
    ),
    responses(
        (status = 200, description = "Updated resident", body = Resident),
        (status = 400, description = "Empty field", body = ErrorResponse),
        (status = 404, description = "Resident not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn update_resident(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(resident_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateResidentRequest>,
) -> Result<Json<Resident>, AppError> {
    let resident = state
        .residents
        .update(tenant.as_str(), &resident_id, req.into())
        .await?;
    Ok(Json(resident))
}

/// Bulk upsert residents by address
#[utoipa::path(
    post,
    path = "/api/admin/residents/import",
    request_body = ImportResidentsRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Import report", body = BulkUpsertReport),
        (status = 400, description = "Empty or oversized batch", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn import_residents(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(req): ValidatedJson<ImportResidentsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let rows = req.residents.into_iter().map(NewResident::from).collect();
    let report = state.residents.bulk_upsert(tenant.as_str(), rows).await?;
    Ok((StatusCode::OK, Json(report)))
}

/// Whether the resident holds a usable activation code. Never returns the code.
#[utoipa::path(
    get,
    path = "/api/admin/residents/{resident_id}/activation-code",
    params(
        ("x-tenant" = String, Header, description = "Tenant id"),
        ("resident_id" = String, Path, description = "Resident id")
    ),
    responses(
        (status = 200, description = "Activation status", body = ActivationCodeStatusResponse),
        (status = 404, description = "Resident not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn activation_code_status(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(resident_id): Path<String>,
) -> Result<Json<ActivationCodeStatusResponse>, AppError> {
    let resident = state
        .residents
        .get_by_id(tenant.as_str(), &resident_id)
        .await?;
    let active = state
        .activation
        .find_active_by_resident(tenant.as_str(), &resident.id)
        .await?;
    let activated = state
        .users
        .find_by_resident(tenant.as_str(), &resident.id)
        .await?
        .is_some();

    Ok(Json(ActivationCodeStatusResponse {
        resident_id: resident.id,
        has_active_code: active.is_some(),
        activated,
        expires_at: active.as_ref().map(|c| c.expires_at),
        issued_at: active.as_ref().map(|c| c.created_at),
        attempt_count: active.as_ref().map(|c| c.attempt_count),
    }))
}
