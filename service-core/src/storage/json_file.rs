use super::{validate_names, LockRegistry, RecordStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;
use uuid::Uuid;

/// One JSON array file per tenant and resource:
/// `{data_dir}/{tenant}/{resource}.json`.
///
/// A tenant without its own file reads `{seed_dir}/{resource}.json` instead,
/// so new municipalities start from shared seed data. Writes land in a temp
/// file next to the target and are renamed over it.
#[derive(Debug)]
pub struct JsonFileStore {
    data_dir: PathBuf,
    seed_dir: Option<PathBuf>,
    locks: LockRegistry,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>, seed_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            seed_dir,
            locks: LockRegistry::default(),
        }
    }

    fn tenant_file(&self, tenant: &str, resource: &str) -> PathBuf {
        self.data_dir.join(tenant).join(format!("{resource}.json"))
    }

    async fn read_list(path: &Path) -> Result<Option<Vec<Value>>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Some(Vec::new())),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn get_all(&self, tenant: &str, resource: &str) -> Result<Vec<Value>, StoreError> {
        validate_names(tenant, resource)?;

        if let Some(records) = Self::read_list(&self.tenant_file(tenant, resource)).await? {
            return Ok(records);
        }

        if let Some(seed_dir) = &self.seed_dir {
            let seed = seed_dir.join(format!("{resource}.json"));
            if let Some(records) = Self::read_list(&seed).await? {
                tracing::debug!(tenant, resource, "Serving seed data");
                return Ok(records);
            }
        }

        Ok(Vec::new())
    }

    async fn set_all(
        &self,
        tenant: &str,
        resource: &str,
        records: Vec<Value>,
    ) -> Result<(), StoreError> {
        validate_names(tenant, resource)?;

        let target = self.tenant_file(tenant, resource);
        let dir = self.data_dir.join(tenant);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| StoreError::Io { path, source }
        };

        tokio::fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let tmp = dir.join(format!(".{resource}.{}.tmp", Uuid::new_v4()));
        let body = serde_json::to_vec_pretty(&records)?;
        tokio::fs::write(&tmp, body).await.map_err(io_err(&tmp))?;

        if let Err(source) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Io {
                path: target,
                source,
            });
        }

        Ok(())
    }

    fn write_lock(&self, tenant: &str, resource: &str) -> Arc<Mutex<()>> {
        self.locks.get(tenant, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), None);

        store
            .set_all("fulda", "residents", vec![json!({"id": "r1"})])
            .await
            .unwrap();

        let records = store.get_all("fulda", "residents").await.unwrap();
        assert_eq!(records, vec![json!({"id": "r1"})]);
        assert!(dir.path().join("fulda").join("residents.json").exists());

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("fulda"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_seed() {
        let data = tempfile::tempdir().unwrap();
        let seed = tempfile::tempdir().unwrap();
        std::fs::write(seed.path().join("events.json"), r#"[{"title": "Stadtfest"}]"#).unwrap();

        let store = JsonFileStore::new(data.path(), Some(seed.path().to_path_buf()));

        let records = store.get_all("fulda", "events").await.unwrap();
        assert_eq!(records, vec![json!({"title": "Stadtfest"})]);

        // Tenant data wins once written
        store.set_all("fulda", "events", vec![]).await.unwrap();
        assert!(store.get_all("fulda", "events").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), None);

        let err = store.get_all("../secrets", "residents").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("fulda")).unwrap();
        std::fs::write(dir.path().join("fulda").join("residents.json"), "{not json").unwrap();

        let store = JsonFileStore::new(dir.path(), None);
        let err = store.get_all("fulda", "residents").await.unwrap_err();
        assert!(matches!(err, StoreError::Serde(_)));
    }
}
