use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use service_core::storage::{Collection, RecordStore};
use std::sync::Arc;

use super::error::ServiceError;
use crate::models::RefreshToken;

const RESOURCE: &str = "refresh-tokens";
const TOKEN_BYTES: usize = 32;

/// Expired records older than this are dropped on write.
const RETENTION_AFTER_EXPIRY_DAYS: i64 = 7;

fn generate_plaintext() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn prune(list: &mut Vec<RefreshToken>, now: DateTime<Utc>) {
    let cutoff = now - Duration::days(RETENTION_AFTER_EXPIRY_DAYS);
    list.retain(|t| t.expires_at > cutoff);
}

/// Result of a successful rotation.
#[derive(Debug, Clone)]
pub struct RotatedToken {
    pub previous: RefreshToken,
    pub plaintext: String,
    pub record: RefreshToken,
}

/// Opaque refresh tokens, stored only as SHA-256 hashes.
#[derive(Clone)]
pub struct RefreshTokenStore {
    tokens: Collection<RefreshToken>,
    expiry_days: i64,
}

impl RefreshTokenStore {
    pub fn new(store: Arc<dyn RecordStore>, expiry_days: i64) -> Self {
        Self {
            tokens: Collection::new(store, RESOURCE),
            expiry_days,
        }
    }

    /// New token for `user_id`. The returned plaintext is never stored.
    pub async fn issue(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<(String, RefreshToken), ServiceError> {
        let plaintext = generate_plaintext();
        let record = RefreshToken::new(tenant_id, user_id, &plaintext, self.expiry_days);

        let stored = record.clone();
        self.tokens
            .update(tenant_id, move |list| {
                prune(list, Utc::now());
                list.push(stored);
                Ok::<_, ServiceError>(())
            })
            .await?;

        Ok((plaintext, record))
    }

    pub async fn find_by_token(
        &self,
        tenant_id: &str,
        plaintext: &str,
    ) -> Result<Option<RefreshToken>, ServiceError> {
        let token_hash = RefreshToken::hash_token(plaintext);
        Ok(self
            .tokens
            .all(tenant_id)
            .await?
            .into_iter()
            .find(|t| t.token_hash == token_hash))
    }

    /// Revoke the presented token and issue its successor in one write.
    /// Unknown, revoked and expired tokens are all rejected alike.
    pub async fn rotate(
        &self,
        tenant_id: &str,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> Result<RotatedToken, ServiceError> {
        let token_hash = RefreshToken::hash_token(plaintext);
        let expiry_days = self.expiry_days;

        self.tokens
            .update(tenant_id, move |list| {
                let current = list
                    .iter_mut()
                    .find(|t| t.token_hash == token_hash)
                    .ok_or(ServiceError::InvalidRefreshToken)?;

                if current.is_revoked() {
                    tracing::warn!(token_id = %current.id, user_id = %current.user_id, "Revoked refresh token presented");
                    return Err(ServiceError::InvalidRefreshToken);
                }
                if current.is_expired_at(now) {
                    return Err(ServiceError::InvalidRefreshToken);
                }

                current.revoked_at = Some(now);
                let previous = current.clone();

                let plaintext = generate_plaintext();
                let record =
                    RefreshToken::new(tenant_id, &previous.user_id, &plaintext, expiry_days);
                prune(list, now);
                list.push(record.clone());

                Ok(RotatedToken {
                    previous,
                    plaintext,
                    record,
                })
            })
            .await
    }

    /// Revoke if present and still live. Returns whether anything changed;
    /// nothing is written when no live token matches.
    pub async fn revoke(&self, tenant_id: &str, plaintext: &str) -> Result<bool, ServiceError> {
        let token_hash = RefreshToken::hash_token(plaintext);
        let now = Utc::now();

        let live = self
            .tokens
            .all(tenant_id)
            .await?
            .iter()
            .any(|t| t.token_hash == token_hash && !t.is_revoked());
        if !live {
            return Ok(false);
        }

        self.tokens
            .update(tenant_id, move |list| {
                match list
                    .iter_mut()
                    .find(|t| t.token_hash == token_hash && !t.is_revoked())
                {
                    Some(token) => {
                        token.revoked_at = Some(now);
                        Ok::<_, ServiceError>(true)
                    }
                    None => Ok(false),
                }
            })
            .await
    }
}
