//! Citizen accounts created by activation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Roles in ascending rank. Authorization compares ranks ("at least STAFF"),
/// never exact membership.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Tourist,
    User,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Tourist => "TOURIST",
            Role::User => "USER",
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
        }
    }

    /// `true` when this role ranks at or above `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }

    /// Roles that may be held by a resident-backed account.
    pub fn is_account_role(self) -> bool {
        self != Role::Tourist
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TOURIST" => Ok(Role::Tourist),
            "USER" => Ok(Role::User),
            "STAFF" => Ok(Role::Staff),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Stored account. Never serialized to API clients; see [`UserSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub tenant_id: String,
    pub resident_id: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized email: trimmed, lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthUser {
    pub fn new(tenant_id: &str, resident_id: &str, email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            resident_id: resident_id.to_string(),
            email: normalize_email(email),
            password_hash,
            role: Role::User,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self, display_name: String) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            resident_id: self.resident_id.clone(),
            display_name,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub tenant_id: String,
    pub resident_id: String,
    #[schema(example = "Anna M.")]
    pub display_name: String,
    pub email: String,
    pub role: Role,
}
