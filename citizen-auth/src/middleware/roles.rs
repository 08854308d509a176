//! Rank-based role checks: a principal passes when its role is at least
//! the required one (TOURIST < USER < STAFF < ADMIN).

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;
use std::marker::PhantomData;

use super::auth::Principal;
use crate::models::Role;
use crate::AppState;

pub trait RoleRequirement {
    const REQUIRED: Role;
}

/// Staff members and administrators.
pub struct StaffRole;

impl RoleRequirement for StaffRole {
    const REQUIRED: Role = Role::Staff;
}

pub fn ensure_role(principal: &Principal, required: Role) -> Result<(), AppError> {
    if principal.role().satisfies(required) {
        Ok(())
    } else {
        tracing::warn!(
            role = %principal.role(),
            required = %required,
            "Insufficient role"
        );
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Keine Berechtigung für diese Aktion"
        )))
    }
}

/// A principal whose role satisfies `R`.
pub struct Authorized<R> {
    pub principal: Principal,
    _requirement: PhantomData<R>,
}

#[async_trait]
impl<R> FromRequestParts<AppState> for Authorized<R>
where
    R: RoleRequirement + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        ensure_role(&principal, R::REQUIRED)?;
        Ok(Self {
            principal,
            _requirement: PhantomData,
        })
    }
}
