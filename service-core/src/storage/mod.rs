//! Tenant-scoped record storage.
//!
//! Every resource (residents, activation codes, ...) is one JSON array per
//! tenant. Callers read the whole list, mutate it in memory and write the
//! whole list back. [`Collection::update`] serialises that cycle per
//! (tenant, resource) inside this process so concurrent writers cannot drop
//! each other's changes; separate processes sharing a data directory are not
//! coordinated.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{marker::PhantomData, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;

/// Maximum length of a tenant identifier.
pub const MAX_TENANT_ID_LEN: usize = 40;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("name pattern is a valid regex"));

/// `true` for lowercase `[a-z0-9-]` identifiers of at most 40 characters.
pub fn is_valid_tenant_id(tenant: &str) -> bool {
    tenant.len() <= MAX_TENANT_ID_LEN && NAME_PATTERN.is_match(tenant)
}

fn validate_names(tenant: &str, resource: &str) -> Result<(), StoreError> {
    if !is_valid_tenant_id(tenant) {
        return Err(StoreError::InvalidName(tenant.to_string()));
    }
    if !NAME_PATTERN.is_match(resource) {
        return Err(StoreError::InvalidName(resource.to_string()));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid tenant or resource name: {0:?}")]
    InvalidName(String),
}

/// Backing store contract: whole-list reads and writes per tenant and resource.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_all(&self, tenant: &str, resource: &str) -> Result<Vec<Value>, StoreError>;

    async fn set_all(
        &self,
        tenant: &str,
        resource: &str,
        records: Vec<Value>,
    ) -> Result<(), StoreError>;

    /// Mutex guarding read-modify-write cycles on one (tenant, resource) pair.
    fn write_lock(&self, tenant: &str, resource: &str) -> Arc<Mutex<()>>;
}

/// Lazily created per-(tenant, resource) mutexes.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn get(&self, tenant: &str, resource: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry((tenant.to_string(), resource.to_string()))
            .or_default()
            .clone()
    }
}

/// Typed view over one resource of a [`RecordStore`].
pub struct Collection<T> {
    store: Arc<dyn RecordStore>,
    resource: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            resource: self.resource,
            _marker: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    pub fn new(store: Arc<dyn RecordStore>, resource: &'static str) -> Self {
        Self {
            store,
            resource,
            _marker: PhantomData,
        }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    /// Every record of this resource for `tenant`.
    pub async fn all(&self, tenant: &str) -> Result<Vec<T>, StoreError> {
        self.store
            .get_all(tenant, self.resource)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }

    /// Replace the full list for `tenant`.
    pub async fn replace_all(&self, tenant: &str, records: &[T]) -> Result<(), StoreError> {
        let lock = self.store.write_lock(tenant, self.resource);
        let _guard = lock.lock().await;
        self.write(tenant, records).await
    }

    /// Read-modify-write under the (tenant, resource) lock.
    ///
    /// Nothing is written when `f` returns an error.
    pub async fn update<R, E, F>(&self, tenant: &str, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Vec<T>) -> Result<R, E> + Send,
        E: From<StoreError>,
    {
        let lock = self.store.write_lock(tenant, self.resource);
        let _guard = lock.lock().await;

        let mut records = self.all(tenant).await?;
        let outcome = f(&mut records)?;
        self.write(tenant, &records).await?;
        Ok(outcome)
    }

    async fn write(&self, tenant: &str, records: &[T]) -> Result<(), StoreError> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.set_all(tenant, self.resource, values).await
    }
}
