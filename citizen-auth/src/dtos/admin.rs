use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{NewResident, ResidentPatch, ResidentStatus, Role};

/// Missing fields deserialize as empty and are reported by the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResidentRequest {
    #[serde(default)]
    #[validate(length(max = 100))]
    #[schema(example = "Anna")]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    #[schema(example = "Muster")]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(max = 16))]
    #[schema(example = "36115")]
    pub postal_code: String,

    #[serde(default)]
    #[validate(length(max = 16))]
    #[schema(example = "12A")]
    pub house_number: String,
}

impl From<CreateResidentRequest> for NewResident {
    fn from(req: CreateResidentRequest) -> Self {
        NewResident {
            first_name: req.first_name,
            last_name: req.last_name,
            postal_code: req.postal_code,
            house_number: req.house_number,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResidentResponse {
    pub resident_id: String,
    /// `false` when an existing resident at the same address was updated
    pub created: bool,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResidentRequest {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 16))]
    pub postal_code: Option<String>,
    #[validate(length(max = 16))]
    pub house_number: Option<String>,
    pub status: Option<ResidentStatus>,
}

impl From<UpdateResidentRequest> for ResidentPatch {
    fn from(req: UpdateResidentRequest) -> Self {
        ResidentPatch {
            first_name: req.first_name,
            last_name: req.last_name,
            postal_code: req.postal_code,
            house_number: req.house_number,
            status: req.status,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResidentsRequest {
    #[validate(length(min = 1, max = 10000, message = "1 bis 10000 Einträge erlaubt"))]
    pub residents: Vec<CreateResidentRequest>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivationCodeRequest {
    #[validate(length(min = 1, message = "residentId fehlt"))]
    pub resident_id: String,

    /// Defaults to the configured expiry
    #[validate(range(min = 1, max = 365, message = "expiresInDays muss zwischen 1 und 365 liegen"))]
    #[schema(example = 30)]
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivationCodeResponse {
    pub resident_id: String,
    /// Plaintext code, shown exactly once
    #[schema(example = "AB12-CD34")]
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivationCodeStatusResponse {
    pub resident_id: String,
    pub has_active_code: bool,
    /// Whether the resident already activated an account
    pub activated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_count: Option<u32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTouristCodesRequest {
    #[schema(example = 7)]
    pub duration_days: u32,
    #[schema(example = 10)]
    pub amount: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTouristCodesResponse {
    /// Plaintext codes in display form, shown exactly once
    pub codes: Vec<String>,
    pub duration_days: u32,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TouristCodeListQuery {
    /// ACTIVE, REDEEMED or REVOKED
    pub status: Option<String>,
    pub duration_days: Option<u32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetRoleRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetRoleResponse {
    pub user_id: String,
    pub role: Role,
}
