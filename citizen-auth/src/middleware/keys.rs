//! Tenant-bound API keys (`ADMIN_KEYS`, `SITE_KEYS`).

use std::collections::HashMap;
use subtle::ConstantTimeEq;

use super::tenant::Tenant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRejection {
    /// No key presented, or the key is not configured.
    Unknown,
    /// The key belongs to another tenant.
    TenantMismatch,
}

/// Map of key -> tenant id. Every configured key is compared in constant
/// time so lookups do not leak how much of a key matched.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: Vec<(String, String)>,
}

impl KeyRing {
    pub fn new(keys: &HashMap<String, String>) -> Self {
        Self {
            keys: keys
                .iter()
                .map(|(key, tenant)| (key.clone(), tenant.to_lowercase()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn tenant_for(&self, presented: &str) -> Option<&str> {
        let mut found = None;
        for (key, tenant) in &self.keys {
            if bool::from(key.as_bytes().ct_eq(presented.as_bytes())) {
                found = Some(tenant.as_str());
            }
        }
        found
    }

    pub fn authorize(&self, presented: Option<&str>, tenant: &Tenant) -> Result<(), KeyRejection> {
        let bound = presented
            .and_then(|key| self.tenant_for(key))
            .ok_or(KeyRejection::Unknown)?;

        if bound != tenant.as_str() {
            return Err(KeyRejection::TenantMismatch);
        }
        Ok(())
    }
}
