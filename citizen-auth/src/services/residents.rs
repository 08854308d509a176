use serde::Serialize;
use service_core::storage::{Collection, RecordStore};
use std::sync::Arc;
use utoipa::ToSchema;

use super::error::ServiceError;
use crate::models::resident::normalize_address_part;
use crate::models::{NewResident, Resident, ResidentPatch};

const RESOURCE: &str = "residents";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkRowError {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpsertReport {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<BulkRowError>,
}

/// Tenant-scoped registry of residents, deduplicated by address.
#[derive(Clone)]
pub struct ResidentRegistry {
    residents: Collection<Resident>,
}

fn missing_field(field: &str) -> ServiceError {
    ServiceError::Validation(format!("Pflichtfeld fehlt: {}", field))
}

fn same_address(resident: &Resident, fields: &NewResident) -> bool {
    normalize_address_part(&resident.postal_code) == normalize_address_part(&fields.postal_code)
        && normalize_address_part(&resident.house_number)
            == normalize_address_part(&fields.house_number)
}

/// Find-or-create by address inside an already locked list.
fn upsert_into(
    tenant_id: &str,
    list: &mut Vec<Resident>,
    fields: &NewResident,
) -> Result<(Resident, UpsertOutcome), ServiceError> {
    let fields = fields.cleaned().map_err(missing_field)?;

    if let Some(existing) = list.iter_mut().find(|r| same_address(r, &fields)) {
        existing.apply(ResidentPatch {
            first_name: Some(fields.first_name),
            last_name: Some(fields.last_name),
            ..ResidentPatch::default()
        });
        return Ok((existing.clone(), UpsertOutcome::Updated));
    }

    let resident = Resident::new(tenant_id, fields);
    list.push(resident.clone());
    Ok((resident, UpsertOutcome::Created))
}

impl ResidentRegistry {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            residents: Collection::new(store, RESOURCE),
        }
    }

    /// Append a resident without deduplication.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn create(
        &self,
        tenant_id: &str,
        fields: NewResident,
    ) -> Result<Resident, ServiceError> {
        let fields = fields.cleaned().map_err(missing_field)?;
        let resident = Resident::new(tenant_id, fields);

        let created = resident.clone();
        self.residents
            .update(tenant_id, move |list| {
                list.push(created);
                Ok::<_, ServiceError>(())
            })
            .await?;

        tracing::info!(resident_id = %resident.id, "Resident created");
        Ok(resident)
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, resident_id = %resident_id))]
    pub async fn update(
        &self,
        tenant_id: &str,
        resident_id: &str,
        patch: ResidentPatch,
    ) -> Result<Resident, ServiceError> {
        for (field, value) in [
            ("firstName", &patch.first_name),
            ("lastName", &patch.last_name),
            ("postalCode", &patch.postal_code),
            ("houseNumber", &patch.house_number),
        ] {
            if value.as_deref().map_or(false, |v| v.trim().is_empty()) {
                return Err(missing_field(field));
            }
        }

        self.residents
            .update(tenant_id, |list| {
                let resident = list
                    .iter_mut()
                    .find(|r| r.id == resident_id)
                    .ok_or(ServiceError::ResidentNotFound)?;
                resident.apply(patch);
                Ok(resident.clone())
            })
            .await
    }

    pub async fn get_by_id(
        &self,
        tenant_id: &str,
        resident_id: &str,
    ) -> Result<Resident, ServiceError> {
        self.residents
            .all(tenant_id)
            .await?
            .into_iter()
            .find(|r| r.id == resident_id)
            .ok_or(ServiceError::ResidentNotFound)
    }

    pub async fn find_by_address(
        &self,
        tenant_id: &str,
        postal_code: &str,
        house_number: &str,
    ) -> Result<Option<Resident>, ServiceError> {
        Ok(self
            .residents
            .all(tenant_id)
            .await?
            .into_iter()
            .find(|r| r.matches_address(postal_code, house_number)))
    }

    pub async fn list(&self, tenant_id: &str) -> Result<Vec<Resident>, ServiceError> {
        let mut residents = self.residents.all(tenant_id).await?;
        residents.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.created_at).cmp(&(&b.last_name, &b.first_name, b.created_at))
        });
        Ok(residents)
    }

    /// Find by address and refresh the name, or create.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn upsert_resident(
        &self,
        tenant_id: &str,
        fields: NewResident,
    ) -> Result<(Resident, UpsertOutcome), ServiceError> {
        self.residents
            .update(tenant_id, |list| upsert_into(tenant_id, list, &fields))
            .await
    }

    /// Upsert every row under one lock. A bad row is reported by index and
    /// never aborts the rest of the batch.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, rows = rows.len()))]
    pub async fn bulk_upsert(
        &self,
        tenant_id: &str,
        rows: Vec<NewResident>,
    ) -> Result<BulkUpsertReport, ServiceError> {
        let report = self
            .residents
            .update(tenant_id, |list| {
                let mut report = BulkUpsertReport::default();
                for (index, row) in rows.iter().enumerate() {
                    match upsert_into(tenant_id, list, row) {
                        Ok((_, UpsertOutcome::Created)) => report.created += 1,
                        Ok((_, UpsertOutcome::Updated)) => report.updated += 1,
                        Err(ServiceError::Validation(message)) => {
                            report.errors.push(BulkRowError { index, message })
                        }
                        Err(e) => report.errors.push(BulkRowError {
                            index,
                            message: e.to_string(),
                        }),
                    }
                }
                Ok::<_, ServiceError>(report)
            })
            .await?;

        tracing::info!(
            created = report.created,
            updated = report.updated,
            failed = report.errors.len(),
            "Resident import finished"
        );
        Ok(report)
    }
}
