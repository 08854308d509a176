use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    middleware::{Authorized, StaffRole},
    models::Resident,
    AppState,
};

/// Residents of the caller's municipality (staff and above)
#[utoipa::path(
    get,
    path = "/api/staff/residents",
    responses(
        (status = 200, description = "Residents of the tenant", body = [Resident]),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Role below STAFF or foreign tenant", body = ErrorResponse)
    ),
    tag = "Staff",
    security(("bearer_auth" = []))
)]
pub async fn list_residents(
    State(state): State<AppState>,
    staff: Authorized<StaffRole>,
) -> Result<Json<Vec<Resident>>, AppError> {
    let residents = state
        .residents
        .list(staff.principal.tenant_id())
        .await?;
    Ok(Json(residents))
}
