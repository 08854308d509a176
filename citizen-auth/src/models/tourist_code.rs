//! Anonymous, duration-limited tourist access codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Access durations on offer, in days.
pub const ALLOWED_DURATIONS: [u32; 3] = [7, 14, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TouristCodeStatus {
    Active,
    Redeemed,
    Revoked,
}

impl std::str::FromStr for TouristCodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(TouristCodeStatus::Active),
            "REDEEMED" => Ok(TouristCodeStatus::Redeemed),
            "REVOKED" => Ok(TouristCodeStatus::Revoked),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// Validated access duration (7, 14 or 30 days).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DurationDays(u32);

impl DurationDays {
    pub fn days(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for DurationDays {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if ALLOWED_DURATIONS.contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("durationDays must be one of 7, 14, 30 (got {})", value))
        }
    }
}

impl From<DurationDays> for u32 {
    fn from(value: DurationDays) -> Self {
        value.0
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: TouristCodeStatus,
    pub to: TouristCodeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouristAccessCode {
    pub id: String,
    pub tenant_id: String,
    pub code_hash: String,
    pub duration_days: DurationDays,
    pub status: TouristCodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_by_device_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TouristAccessCode {
    pub fn new(tenant_id: &str, code_hash: String, duration_days: DurationDays) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            code_hash,
            duration_days,
            status: TouristCodeStatus::Active,
            redeemed_at: None,
            redeemed_by_device_id: None,
            created_at: Utc::now(),
        }
    }

    /// ACTIVE -> REDEEMED, bound to `device_id`.
    pub fn redeem(&mut self, device_id: &str, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        if self.status != TouristCodeStatus::Active {
            return Err(InvalidTransition {
                from: self.status,
                to: TouristCodeStatus::Redeemed,
            });
        }
        self.status = TouristCodeStatus::Redeemed;
        self.redeemed_at = Some(now);
        self.redeemed_by_device_id = Some(device_id.to_string());
        Ok(())
    }

    /// ACTIVE -> REVOKED. Revoking a revoked code is a no-op; a redeemed
    /// code cannot be revoked. Returns whether the status changed.
    pub fn revoke(&mut self) -> Result<bool, InvalidTransition> {
        match self.status {
            TouristCodeStatus::Active => {
                self.status = TouristCodeStatus::Revoked;
                Ok(true)
            }
            TouristCodeStatus::Revoked => Ok(false),
            TouristCodeStatus::Redeemed => Err(InvalidTransition {
                from: self.status,
                to: TouristCodeStatus::Revoked,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seven_day_code() -> TouristAccessCode {
        TouristAccessCode::new("fulda", "hash".to_string(), DurationDays::try_from(7).unwrap())
    }

    #[test]
    fn test_duration_days_accepts_only_offered_values() {
        for days in ALLOWED_DURATIONS {
            assert!(DurationDays::try_from(days).is_ok());
        }
        assert!(DurationDays::try_from(0).is_err());
        assert!(DurationDays::try_from(10).is_err());
        assert!(serde_json::from_str::<DurationDays>("15").is_err());
        assert_eq!(serde_json::from_str::<DurationDays>("14").unwrap().days(), 14);
    }

    #[test]
    fn test_redeem_once() {
        let mut code = seven_day_code();
        let now = Utc::now();
        code.redeem("device-123", now).unwrap();
        assert_eq!(code.status, TouristCodeStatus::Redeemed);
        assert_eq!(code.redeemed_by_device_id.as_deref(), Some("device-123"));

        let err = code.redeem("device-456", now).unwrap_err();
        assert_eq!(err.from, TouristCodeStatus::Redeemed);
        assert_eq!(code.redeemed_by_device_id.as_deref(), Some("device-123"));
    }

    #[test]
    fn test_revoke_transitions() {
        let mut code = seven_day_code();
        assert_eq!(code.revoke(), Ok(true));
        assert_eq!(code.revoke(), Ok(false));
        assert!(code.redeem("device-123", Utc::now()).is_err());

        let mut redeemed = seven_day_code();
        redeemed.redeem("device-123", Utc::now()).unwrap();
        assert!(redeemed.revoke().is_err());
        assert_eq!(redeemed.status, TouristCodeStatus::Redeemed);
    }
}
