use super::{validate_names, LockRegistry, RecordStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-process [`RecordStore`], used by tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<(String, String), Vec<Value>>,
    locks: LockRegistry,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set_all` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_all(&self, tenant: &str, resource: &str) -> Result<Vec<Value>, StoreError> {
        validate_names(tenant, resource)?;
        Ok(self
            .data
            .get(&(tenant.to_string(), resource.to_string()))
            .map(|records| records.clone())
            .unwrap_or_default())
    }

    async fn set_all(
        &self,
        tenant: &str,
        resource: &str,
        records: Vec<Value>,
    ) -> Result<(), StoreError> {
        validate_names(tenant, resource)?;
        self.data
            .insert((tenant.to_string(), resource.to_string()), records);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_lock(&self, tenant: &str, resource: &str) -> Arc<Mutex<()>> {
        self.locks.get(tenant, resource)
    }
}
