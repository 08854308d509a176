//! Resident registry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResidentStatus {
    Active,
    Inactive,
}

/// Registered resident of a municipality (name plus postal address).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: String,
    pub tenant_id: String,
    pub first_name: String,
    pub last_name: String,
    pub postal_code: String,
    pub house_number: String,
    pub status: ResidentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating or upserting a resident.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewResident {
    pub first_name: String,
    pub last_name: String,
    pub postal_code: String,
    pub house_number: String,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ResidentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub postal_code: Option<String>,
    pub house_number: Option<String>,
    pub status: Option<ResidentStatus>,
}

/// Comparison form of a postal code or house number.
pub fn normalize_address_part(value: &str) -> String {
    value.trim().to_uppercase()
}

impl NewResident {
    /// Trimmed copy, or the name of the first missing field.
    pub fn cleaned(&self) -> Result<NewResident, &'static str> {
        let cleaned = NewResident {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            house_number: self.house_number.trim().to_string(),
        };

        if cleaned.first_name.is_empty() {
            return Err("firstName");
        }
        if cleaned.last_name.is_empty() {
            return Err("lastName");
        }
        if cleaned.postal_code.is_empty() {
            return Err("postalCode");
        }
        if cleaned.house_number.is_empty() {
            return Err("houseNumber");
        }
        Ok(cleaned)
    }
}

impl Resident {
    pub fn new(tenant_id: &str, fields: NewResident) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            first_name: fields.first_name,
            last_name: fields.last_name,
            postal_code: fields.postal_code,
            house_number: fields.house_number,
            status: ResidentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// `"{firstName} {lastInitial}."`, e.g. "Anna M.". Never stored.
    pub fn display_name(&self) -> String {
        match self.last_name.trim().chars().next() {
            Some(initial) => format!("{} {}.", self.first_name.trim(), initial.to_uppercase()),
            None => self.first_name.trim().to_string(),
        }
    }

    pub fn matches_address(&self, postal_code: &str, house_number: &str) -> bool {
        normalize_address_part(&self.postal_code) == normalize_address_part(postal_code)
            && normalize_address_part(&self.house_number) == normalize_address_part(house_number)
    }

    pub fn is_active(&self) -> bool {
        self.status == ResidentStatus::Active
    }

    pub fn apply(&mut self, patch: ResidentPatch) {
        if let Some(first_name) = patch.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = last_name.trim().to_string();
        }
        if let Some(postal_code) = patch.postal_code {
            self.postal_code = postal_code.trim().to_string();
        }
        if let Some(house_number) = patch.house_number {
            self.house_number = house_number.trim().to_string();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anna() -> Resident {
        Resident::new(
            "fulda",
            NewResident {
                first_name: "Anna".to_string(),
                last_name: "Muster".to_string(),
                postal_code: "36115".to_string(),
                house_number: "12A".to_string(),
            },
        )
    }

    #[test]
    fn test_display_name() {
        assert_eq!(anna().display_name(), "Anna M.");

        let mut resident = anna();
        resident.last_name = "  özdemir".to_string();
        assert_eq!(resident.display_name(), "Anna Ö.");
    }

    #[test]
    fn test_address_match_is_case_and_space_insensitive() {
        let resident = anna();
        assert!(resident.matches_address("36115", "12A"));
        assert!(resident.matches_address(" 36115 ", "12a "));
        assert!(!resident.matches_address("36116", "12A"));
        assert!(!resident.matches_address("36115", "12B"));
    }

    #[test]
    fn test_cleaned_reports_missing_field() {
        let fields = NewResident {
            first_name: "Anna".to_string(),
            last_name: " ".to_string(),
            postal_code: "36115".to_string(),
            house_number: "12A".to_string(),
        };
        assert_eq!(fields.cleaned(), Err("lastName"));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_value(anna()).unwrap();
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["postalCode"], "36115");
    }
}
