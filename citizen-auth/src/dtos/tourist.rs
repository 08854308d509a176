use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Role, TouristAccessCode, TouristCodeStatus};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    #[validate(length(max = 64))]
    #[schema(example = "A1B2-C3D4-E5F6")]
    pub code: String,

    #[validate(length(max = 128))]
    #[schema(example = "device-123")]
    pub device_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TouristPrincipal {
    /// Id of the redeemed code
    pub id: String,
    pub tenant_id: String,
    pub role: Role,
    pub duration_days: u32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TouristSessionResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    pub user: TouristPrincipal,
}

/// Admin view of a tourist code. The hash is never exposed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TouristCodeView {
    pub id: String,
    pub duration_days: u32,
    pub status: TouristCodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_by_device_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<TouristAccessCode> for TouristCodeView {
    fn from(code: TouristAccessCode) -> Self {
        Self {
            id: code.id,
            duration_days: code.duration_days.days(),
            status: code.status,
            redeemed_at: code.redeemed_at,
            redeemed_by_device_id: code.redeemed_by_device_id,
            created_at: code.created_at,
        }
    }
}
