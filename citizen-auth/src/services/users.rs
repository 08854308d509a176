use chrono::Utc;
use service_core::storage::{Collection, RecordStore};
use std::sync::Arc;

use super::error::ServiceError;
use crate::models::{normalize_email, AuthUser, Role};

const RESOURCE: &str = "users";

/// Which account a role change targets.
#[derive(Debug, Clone)]
pub enum UserSelector {
    Id(String),
    Email(String),
}

impl UserSelector {
    fn matches(&self, user: &AuthUser) -> bool {
        match self {
            UserSelector::Id(id) => user.id == *id,
            UserSelector::Email(email) => user.email == normalize_email(email),
        }
    }
}

/// Accounts per tenant. One per resident, emails unique per tenant.
#[derive(Clone)]
pub struct UserStore {
    users: Collection<AuthUser>,
}

impl UserStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            users: Collection::new(store, RESOURCE),
        }
    }

    pub async fn find_by_email(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<Option<AuthUser>, ServiceError> {
        let email = normalize_email(email);
        Ok(self
            .users
            .all(tenant_id)
            .await?
            .into_iter()
            .find(|u| u.email == email))
    }

    pub async fn find_by_id(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Option<AuthUser>, ServiceError> {
        Ok(self
            .users
            .all(tenant_id)
            .await?
            .into_iter()
            .find(|u| u.id == user_id))
    }

    pub async fn find_by_resident(
        &self,
        tenant_id: &str,
        resident_id: &str,
    ) -> Result<Option<AuthUser>, ServiceError> {
        Ok(self
            .users
            .all(tenant_id)
            .await?
            .into_iter()
            .find(|u| u.resident_id == resident_id))
    }

    pub async fn list(&self, tenant_id: &str) -> Result<Vec<AuthUser>, ServiceError> {
        Ok(self.users.all(tenant_id).await?)
    }

    /// Store a new account. Uniqueness of email and resident is checked
    /// again under the collection lock.
    pub async fn create(&self, user: AuthUser) -> Result<AuthUser, ServiceError> {
        let tenant_id = user.tenant_id.clone();
        self.users
            .update(&tenant_id, move |list| {
                if list.iter().any(|u| u.email == user.email) {
                    return Err(ServiceError::EmailAlreadyRegistered);
                }
                if list.iter().any(|u| u.resident_id == user.resident_id) {
                    return Err(ServiceError::ResidentAlreadyActivated);
                }
                list.push(user.clone());
                Ok(user)
            })
            .await
    }

    /// Delete an account. Only used to undo a half-finished activation.
    pub async fn remove(&self, tenant_id: &str, user_id: &str) -> Result<bool, ServiceError> {
        self.users
            .update(tenant_id, |list| {
                let before = list.len();
                list.retain(|u| u.id != user_id);
                Ok::<_, ServiceError>(list.len() != before)
            })
            .await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, role = %role))]
    pub async fn set_role(
        &self,
        tenant_id: &str,
        selector: UserSelector,
        role: Role,
    ) -> Result<AuthUser, ServiceError> {
        if !role.is_account_role() {
            return Err(ServiceError::Validation(format!(
                "Rolle {} kann keinem Konto zugewiesen werden",
                role
            )));
        }

        let user = self
            .users
            .update(tenant_id, |list| {
                let user = list
                    .iter_mut()
                    .find(|u| selector.matches(u))
                    .ok_or(ServiceError::UserNotFound)?;
                user.role = role;
                user.updated_at = Utc::now();
                Ok::<_, ServiceError>(user.clone())
            })
            .await?;

        tracing::info!(user_id = %user.id, "User role changed");
        Ok(user)
    }
}
