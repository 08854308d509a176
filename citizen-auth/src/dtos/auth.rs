use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Role, UserSummary};
use crate::services::AccessTokenClaims;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    #[validate(length(min = 1, max = 64, message = "Aktivierungscode fehlt"))]
    #[schema(example = "AB12-CD34")]
    pub activation_code: String,

    #[validate(length(min = 3, max = 254, message = "E-Mail-Adresse fehlt"))]
    #[schema(example = "anna@example.com")]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Passwort muss mindestens 8 Zeichen lang sein"))]
    #[schema(example = "sicheres-passwort", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1, max = 16, message = "Postleitzahl fehlt"))]
    #[schema(example = "36115")]
    pub postal_code: String,

    #[validate(length(min = 1, max = 16, message = "Hausnummer fehlt"))]
    #[schema(example = "12A")]
    pub house_number: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254, message = "E-Mail-Adresse fehlt"))]
    #[schema(example = "anna@example.com")]
    pub email: String,

    #[validate(length(min = 1, max = 128, message = "Passwort fehlt"))]
    #[schema(example = "sicheres-passwort")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, max = 256, message = "Refresh-Token fehlt"))]
    pub refresh_token: String,
}

/// Logout accepts anything, including an empty token.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[schema(example = 900)]
    pub expires_in: i64,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 900)]
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    #[schema(example = true)]
    pub ok: bool,
}

/// Decoded principal of the presented bearer token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub sub: String,
    pub tenant_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<AccessTokenClaims> for MeResponse {
    fn from(claims: AccessTokenClaims) -> Self {
        let non_empty = |value: String| (!value.is_empty()).then_some(value);
        Self {
            sub: claims.sub,
            tenant_id: claims.tenant_id,
            role: claims.role,
            resident_id: non_empty(claims.resident_id),
            email: non_empty(claims.email),
            expires_at: claims.expires_at,
        }
    }
}
