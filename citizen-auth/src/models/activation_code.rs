//! One-time activation codes binding a resident to account creation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state derived from the record's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationCodeState {
    Issued,
    Used,
    Revoked,
    Expired,
}

/// Stored activation code. Only the HMAC of the canonical code is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationCode {
    pub id: String,
    pub tenant_id: String,
    pub resident_id: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Attempt budget for a single code is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptsExhausted {
    pub retry_after: Duration,
}

impl ActivationCode {
    pub fn new(tenant_id: &str, resident_id: &str, code_hash: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            resident_id: resident_id.to_string(),
            code_hash,
            expires_at,
            attempt_count: 0,
            created_at: Utc::now(),
            used_at: None,
            revoked_at: None,
            last_attempt_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Revocation wins over use, use over expiry.
    pub fn state_at(&self, now: DateTime<Utc>) -> ActivationCodeState {
        if self.revoked_at.is_some() {
            ActivationCodeState::Revoked
        } else if self.used_at.is_some() {
            ActivationCodeState::Used
        } else if self.is_expired_at(now) {
            ActivationCodeState::Expired
        } else {
            ActivationCodeState::Issued
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == ActivationCodeState::Issued
    }

    /// Count one attempt against this code.
    ///
    /// Attempts within `window` of the previous one accumulate; otherwise the
    /// counter restarts at 1. Once `max_attempts` have accumulated the attempt
    /// is refused without touching the counter.
    pub fn register_attempt_at(
        &mut self,
        now: DateTime<Utc>,
        window: Duration,
        max_attempts: u32,
    ) -> Result<(), AttemptsExhausted> {
        let within_window = self
            .last_attempt_at
            .map_or(false, |last| now - last < window);

        if within_window && self.attempt_count >= max_attempts {
            let retry_after = self
                .last_attempt_at
                .map_or(window, |last| window - (now - last));
            return Err(AttemptsExhausted { retry_after });
        }

        self.attempt_count = if within_window {
            self.attempt_count.saturating_add(1)
        } else {
            1
        };
        self.last_attempt_at = Some(now);
        Ok(())
    }
}
