//! Durable `Store`: a `MemoryStore` with every successful mutation snapshotted
//! to a JSON file (write-new-file + rename, so a crash mid-write cannot
//! corrupt the previous snapshot) and reloaded on construction. Satisfies "a
//! file or external database" from spec.md §2 while preserving the
//! version-based optimistic-lock contract the Ledger depends on.

use crate::{memory::MemoryStore, Error, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_lib::types::{DynamicResourceLifeCycle, Resource};
use std::path::{Path, PathBuf};

pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl FileStore {
    /// Loads any existing snapshot at `path`, or starts empty if none exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let memory = MemoryStore::new();
        if path.exists() {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .context_persist(&path)?;
            let snapshot = serde_json::from_str(&raw).map_err(|source| Error::Serde { source })?;
            memory.restore(snapshot);
            tracing::info!(path = %path.display(), "loaded durable store snapshot");
        }
        Ok(Self { path, memory })
    }

    async fn persist(&self) -> Result<(), Error> {
        let snapshot = self.memory.snapshot();
        let raw = serde_json::to_vec_pretty(&snapshot).map_err(|source| Error::Serde { source })?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &raw).await.context_persist(&tmp)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context_persist(&self.path)?;
        Ok(())
    }
}

trait ContextPersist<T> {
    fn context_persist(self, path: &Path) -> Result<T, Error>;
}

impl<T> ContextPersist<T> for std::io::Result<T> {
    fn context_persist(self, path: &Path) -> Result<T, Error> {
        self.map_err(|source| Error::Persist {
            path: path.display().to_string(),
            source,
        })
    }
}

#[async_trait]
impl Store for FileStore {
    async fn list_resources(&self) -> Result<Vec<Resource>, Error> {
        self.memory.list_resources().await
    }

    async fn get_resource(&self, name: &str) -> Result<Resource, Error> {
        self.memory.get_resource(name).await
    }

    async fn create_resource(&self, resource: Resource) -> Result<Resource, Error> {
        let created = self.memory.create_resource(resource).await?;
        self.persist().await?;
        Ok(created)
    }

    async fn update_resource(&self, resource: Resource) -> Result<Resource, Error> {
        let updated = self.memory.update_resource(resource).await?;
        self.persist().await?;
        Ok(updated)
    }

    async fn delete_resource(&self, name: &str) -> Result<(), Error> {
        self.memory.delete_resource(name).await?;
        self.persist().await
    }

    async fn list_lifecycles(&self) -> Result<Vec<DynamicResourceLifeCycle>, Error> {
        self.memory.list_lifecycles().await
    }

    async fn get_lifecycle(&self, resource_type: &str) -> Result<DynamicResourceLifeCycle, Error> {
        self.memory.get_lifecycle(resource_type).await
    }

    async fn create_lifecycle(
        &self,
        drlc: DynamicResourceLifeCycle,
    ) -> Result<DynamicResourceLifeCycle, Error> {
        let created = self.memory.create_lifecycle(drlc).await?;
        self.persist().await?;
        Ok(created)
    }

    async fn update_lifecycle(
        &self,
        drlc: DynamicResourceLifeCycle,
    ) -> Result<DynamicResourceLifeCycle, Error> {
        let updated = self.memory.update_lifecycle(drlc).await?;
        self.persist().await?;
        Ok(updated)
    }

    async fn delete_lifecycle(&self, resource_type: &str) -> Result<(), Error> {
        self.memory.delete_lifecycle(resource_type).await?;
        self.persist().await
    }

    async fn get_last_reap_sweep(&self) -> Result<Option<DateTime<Utc>>, Error> {
        self.memory.get_last_reap_sweep().await
    }

    async fn set_last_reap_sweep(&self, at: DateTime<Utc>) -> Result<(), Error> {
        self.memory.set_last_reap_sweep(at).await?;
        self.persist().await
    }
}
