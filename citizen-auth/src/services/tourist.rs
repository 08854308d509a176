use chrono::{Duration, Utc};
use service_core::middleware::rate_limit::{AttemptLimiter, RateLimitDecision};
use service_core::storage::{Collection, RecordStore};
use std::collections::HashSet;
use std::sync::Arc;

use super::error::ServiceError;
use super::jwt::JwtService;
use super::metrics;
use crate::dtos::tourist::{TouristPrincipal, TouristSessionResponse};
use crate::models::{DurationDays, Role, TouristAccessCode, TouristCodeStatus};
use crate::utils::code;

const RESOURCE: &str = "tourist-codes";

/// Random bytes per tourist code (12 hex characters).
const CODE_BYTES: usize = 6;
const MAX_GENERATION_ATTEMPTS: usize = 10;
const MAX_BATCH: u32 = 1000;
const MIN_DEVICE_ID_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct GeneratedTouristCodes {
    /// Display form, the only plaintext copies
    pub codes: Vec<String>,
    pub duration_days: DurationDays,
}

#[derive(Debug, Clone, Default)]
pub struct TouristCodeFilter {
    pub status: Option<TouristCodeStatus>,
    pub duration_days: Option<u32>,
}

/// Batch generation, admin listing and revocation, and redemption of
/// tourist access codes.
#[derive(Clone)]
pub struct TouristCodeService {
    codes: Collection<TouristAccessCode>,
    jwt: JwtService,
    limiter: Arc<dyn AttemptLimiter>,
}

impl TouristCodeService {
    pub fn new(store: Arc<dyn RecordStore>, jwt: JwtService, limiter: Arc<dyn AttemptLimiter>) -> Self {
        Self {
            codes: Collection::new(store, RESOURCE),
            jwt,
            limiter,
        }
    }

    /// Generate `amount` codes in one write. If any code cannot be made
    /// unique the whole batch is discarded.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, duration_days = duration_days, amount = amount))]
    pub async fn generate_codes(
        &self,
        tenant_id: &str,
        duration_days: u32,
        amount: u32,
    ) -> Result<GeneratedTouristCodes, ServiceError> {
        let duration_days = DurationDays::try_from(duration_days).map_err(ServiceError::Validation)?;
        if !(1..=MAX_BATCH).contains(&amount) {
            return Err(ServiceError::Validation(format!(
                "amount muss zwischen 1 und {} liegen",
                MAX_BATCH
            )));
        }

        let codes = self
            .codes
            .update(tenant_id, |list| {
                let mut taken: HashSet<String> = list.iter().map(|c| c.code_hash.clone()).collect();
                let mut codes = Vec::with_capacity(amount as usize);

                for _ in 0..amount {
                    let mut generated = None;
                    for _ in 0..MAX_GENERATION_ATTEMPTS {
                        let display = code::format(&code::random_hex_code(CODE_BYTES));
                        let canonical = code::normalize(&display);
                        let code_hash = code::hash_tenant_code(tenant_id, &canonical);
                        if taken.insert(code_hash.clone()) {
                            list.push(TouristAccessCode::new(tenant_id, code_hash, duration_days));
                            generated = Some(display);
                            break;
                        }
                    }
                    codes.push(generated.ok_or(ServiceError::CodeGenerationExhausted)?);
                }

                Ok::<_, ServiceError>(codes)
            })
            .await?;

        tracing::info!(generated = codes.len(), "Tourist codes generated");
        Ok(GeneratedTouristCodes {
            codes,
            duration_days,
        })
    }

    /// Newest first.
    pub async fn list_codes(
        &self,
        tenant_id: &str,
        filter: &TouristCodeFilter,
    ) -> Result<Vec<TouristAccessCode>, ServiceError> {
        let mut codes: Vec<_> = self
            .codes
            .all(tenant_id)
            .await?
            .into_iter()
            .filter(|c| filter.status.map_or(true, |status| c.status == status))
            .filter(|c| filter.duration_days.map_or(true, |days| c.duration_days.days() == days))
            .collect();
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(codes)
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, code_id = %code_id))]
    pub async fn revoke(
        &self,
        tenant_id: &str,
        code_id: &str,
    ) -> Result<TouristAccessCode, ServiceError> {
        self.codes
            .update(tenant_id, |list| {
                let record = list
                    .iter_mut()
                    .find(|c| c.id == code_id)
                    .ok_or(ServiceError::TouristCodeNotFound)?;
                match record.revoke() {
                    Ok(true) => tracing::info!("Tourist code revoked"),
                    Ok(false) => {}
                    Err(_) => return Err(ServiceError::TouristCodeRedeemed),
                }
                Ok(record.clone())
            })
            .await
    }

    /// Bind the code to a device and open a tourist session lasting the
    /// code's duration.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, ip = %ip))]
    pub async fn redeem(
        &self,
        tenant_id: &str,
        input: &str,
        device_id: &str,
        ip: &str,
    ) -> Result<TouristSessionResponse, ServiceError> {
        let result = self.redeem_code(tenant_id, input, device_id, ip).await;
        match &result {
            Ok(session) => {
                tracing::info!(code_id = %session.user.id, "Tourist code redeemed");
                metrics::record_tourist_redemption("success");
            }
            Err(e) => {
                tracing::warn!(reason = %e, "Tourist code redemption failed");
                metrics::record_tourist_redemption(e.outcome());
            }
        }
        result
    }

    async fn redeem_code(
        &self,
        tenant_id: &str,
        input: &str,
        device_id: &str,
        ip: &str,
    ) -> Result<TouristSessionResponse, ServiceError> {
        let canonical = code::normalize(input);
        if !code::is_canonical_tourist_code(&canonical) {
            return Err(ServiceError::Validation(
                "Code muss aus 12 Zeichen bestehen".to_string(),
            ));
        }
        let device_id = device_id.trim();
        if device_id.chars().count() < MIN_DEVICE_ID_LEN {
            return Err(ServiceError::Validation(
                "deviceId muss mindestens 3 Zeichen lang sein".to_string(),
            ));
        }

        let key = format!("redeem:{}", ip);
        // Reserve before the lookup; only failed guesses keep the attempt
        if let RateLimitDecision::Limited { retry_after } = self.limiter.check_and_increment(&key) {
            metrics::record_rate_limited("redeem");
            return Err(ServiceError::too_many_attempts(retry_after));
        }

        let code_hash = code::hash_tenant_code(tenant_id, &canonical);
        let now = Utc::now();
        let redeemed = self
            .codes
            .update(tenant_id, |list| {
                let record = list
                    .iter_mut()
                    .find(|c| c.code_hash == code_hash)
                    .ok_or(ServiceError::TouristCodeNotFound)?;
                record
                    .redeem(device_id, now)
                    .map_err(|_| ServiceError::TouristCodeNotActive)?;
                Ok::<_, ServiceError>(record.clone())
            })
            .await;

        if !matches!(redeemed, Err(ServiceError::TouristCodeNotFound)) {
            self.limiter.release(&key);
        }
        let record = redeemed?;

        let expires_at = now + Duration::days(i64::from(record.duration_days.days()));
        let access_token = self
            .jwt
            .generate_tourist_token(tenant_id, &record.id, expires_at)?;

        Ok(TouristSessionResponse {
            access_token,
            token_type: "Bearer".to_string(),
            user: TouristPrincipal {
                id: record.id,
                tenant_id: tenant_id.to_string(),
                role: Role::Tourist,
                duration_days: record.duration_days.days(),
                expires_at,
            },
        })
    }
}
