use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::admin::{SetRoleRequest, SetRoleResponse},
    middleware::Tenant,
    services::UserSelector,
    utils::ValidatedJson,
    AppState,
};

/// Change the role of an account, selected by id or email
#[utoipa::path(
    post,
    path = "/api/admin/users/role",
    request_body = SetRoleRequest,
    params(("x-tenant" = String, Header, description = "Tenant id")),
    responses(
        (status = 200, description = "Role changed", body = SetRoleResponse),
        (status = 400, description = "Neither userId nor email given, or role not assignable", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_key" = []))
)]
pub async fn set_user_role(
    State(state): State<AppState>,
    tenant: Tenant,
    ValidatedJson(req): ValidatedJson<SetRoleRequest>,
) -> Result<Json<SetRoleResponse>, AppError> {
    let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let selector = match (non_blank(req.user_id), non_blank(req.email)) {
        (Some(id), _) => UserSelector::Id(id.trim().to_string()),
        (None, Some(email)) => UserSelector::Email(email),
        (None, None) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "userId oder email ist erforderlich"
            )))
        }
    };

    let user = state
        .users
        .set_role(tenant.as_str(), selector, req.role)
        .await?;

    Ok(Json(SetRoleResponse {
        user_id: user.id,
        role: user.role,
    }))
}
