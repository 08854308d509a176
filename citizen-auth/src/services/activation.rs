use chrono::{DateTime, Duration, Utc};
use service_core::storage::{Collection, RecordStore};
use std::sync::Arc;

use super::error::ServiceError;
use crate::models::{ActivationCode, ActivationCodeState};
use crate::utils::code;

const RESOURCE: &str = "activation-codes";

/// Random bytes per activation code (8 hex characters).
const CODE_BYTES: usize = 4;
const MAX_GENERATION_ATTEMPTS: usize = 5;

/// A freshly issued code. `code` is the only plaintext copy.
#[derive(Debug, Clone)]
pub struct IssuedActivationCode {
    pub code: String,
    pub activation: ActivationCode,
}

/// Issues, looks up and consumes activation codes.
#[derive(Clone)]
pub struct ActivationCodeService {
    codes: Collection<ActivationCode>,
    secret: Arc<[u8]>,
    max_attempts: u32,
    attempt_window: Duration,
}

impl ActivationCodeService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        secret: &str,
        max_attempts: u32,
        attempt_window: Duration,
    ) -> Self {
        Self {
            codes: Collection::new(store, RESOURCE),
            secret: Arc::from(secret.as_bytes()),
            max_attempts,
            attempt_window,
        }
    }

    /// Tenant-salted HMAC of the canonical form of `input`.
    pub fn hash_code(&self, tenant_id: &str, input: &str) -> Result<String, ServiceError> {
        Ok(code::hmac_tenant_code(
            &self.secret,
            tenant_id,
            &code::normalize(input),
        )?)
    }

    /// Revoke every active code of the resident, then store a new one.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, resident_id = %resident_id))]
    pub async fn create_code(
        &self,
        tenant_id: &str,
        resident_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedActivationCode, ServiceError> {
        let issued = self
            .codes
            .update(tenant_id, |list| {
                let now = Utc::now();
                let mut revoked = 0usize;
                for existing in list
                    .iter_mut()
                    .filter(|c| c.resident_id == resident_id && c.is_active_at(now))
                {
                    existing.revoked_at = Some(now);
                    revoked += 1;
                }
                if revoked > 0 {
                    tracing::info!(revoked, "Revoked previous activation codes");
                }

                for _ in 0..MAX_GENERATION_ATTEMPTS {
                    let canonical = code::normalize(&code::random_hex_code(CODE_BYTES));
                    let code_hash = self.hash_code(tenant_id, &canonical)?;
                    if list.iter().any(|c| c.code_hash == code_hash) {
                        tracing::warn!("Activation code collision, retrying");
                        continue;
                    }

                    let activation = ActivationCode::new(tenant_id, resident_id, code_hash, expires_at);
                    list.push(activation.clone());
                    return Ok(IssuedActivationCode {
                        code: code::format(&canonical),
                        activation,
                    });
                }

                Err(ServiceError::CodeGenerationExhausted)
            })
            .await?;

        tracing::info!(activation_id = %issued.activation.id, "Activation code issued");
        Ok(issued)
    }

    pub async fn find_by_hash(
        &self,
        tenant_id: &str,
        code_hash: &str,
    ) -> Result<Option<ActivationCode>, ServiceError> {
        Ok(self
            .codes
            .all(tenant_id)
            .await?
            .into_iter()
            .find(|c| c.code_hash == code_hash))
    }

    /// Newest code of the resident that is neither used, revoked nor expired.
    pub async fn find_active_by_resident(
        &self,
        tenant_id: &str,
        resident_id: &str,
    ) -> Result<Option<ActivationCode>, ServiceError> {
        let now = Utc::now();
        Ok(self
            .codes
            .all(tenant_id)
            .await?
            .into_iter()
            .filter(|c| c.resident_id == resident_id && c.is_active_at(now))
            .max_by_key(|c| c.created_at))
    }

    /// Apply `patch` to one record under the collection lock.
    pub async fn update<F>(
        &self,
        tenant_id: &str,
        activation_id: &str,
        patch: F,
    ) -> Result<ActivationCode, ServiceError>
    where
        F: FnOnce(&mut ActivationCode) -> Result<(), ServiceError> + Send,
    {
        self.codes
            .update(tenant_id, |list| {
                let record = list
                    .iter_mut()
                    .find(|c| c.id == activation_id)
                    .ok_or(ServiceError::InvalidActivationCode)?;
                patch(record)?;
                Ok(record.clone())
            })
            .await
    }

    /// Count one redemption attempt against the code; refuses with 429 once
    /// the per-code budget for the window is spent.
    pub async fn register_attempt(
        &self,
        tenant_id: &str,
        activation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ActivationCode, ServiceError> {
        let (window, max_attempts) = (self.attempt_window, self.max_attempts);
        self.update(tenant_id, activation_id, move |record| {
            record
                .register_attempt_at(now, window, max_attempts)
                .map_err(|exhausted| {
                    tracing::warn!(activation_id = %record.id, "Activation code attempt budget exhausted");
                    ServiceError::too_many_attempts(
                        exhausted.retry_after.to_std().unwrap_or_default(),
                    )
                })
        })
        .await
    }

    /// Consume the code. Re-checks the state under the lock so two
    /// concurrent activations cannot both succeed.
    pub async fn mark_used(
        &self,
        tenant_id: &str,
        activation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ActivationCode, ServiceError> {
        self.update(tenant_id, activation_id, move |record| {
            match record.state_at(now) {
                ActivationCodeState::Issued => {
                    record.used_at = Some(now);
                    Ok(())
                }
                ActivationCodeState::Used => Err(ServiceError::ActivationCodeUsed),
                ActivationCodeState::Revoked => Err(ServiceError::ActivationCodeRevoked),
                ActivationCodeState::Expired => Err(ServiceError::ActivationCodeExpired),
            }
        })
        .await
    }
}
