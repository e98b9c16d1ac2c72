//! In-memory `Store`: the default for tests and for single-process
//! deployments with no durability requirement (spec.md §9 open question).

use crate::{error, Error, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_lib::types::{DynamicResourceLifeCycle, Resource};
use parking_lot::Mutex;
use snafu::OptionExt;
use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct Inner {
    pub(crate) resources: HashMap<String, Resource>,
    pub(crate) lifecycles: HashMap<String, DynamicResourceLifeCycle>,
    pub(crate) last_reap_sweep: Option<DateTime<Utc>>,
}

/// A `HashMap`-backed `Store` guarded by a single mutex. No durability across
/// restarts; wrap with `FileStore` when that's required.
#[derive(Default)]
pub struct MemoryStore {
    pub(crate) inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the whole table; used by `FileStore` to serialise to disk.
    pub(crate) fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        Snapshot {
            resources: inner.resources.values().cloned().collect(),
            lifecycles: inner.lifecycles.values().cloned().collect(),
            last_reap_sweep: inner.last_reap_sweep,
        }
    }

    /// Replace the whole table; used by `FileStore` on construction.
    pub(crate) fn restore(&self, snapshot: Snapshot) {
        let mut inner = self.inner.lock();
        inner.resources = snapshot
            .resources
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        inner.lifecycles = snapshot
            .lifecycles
            .into_iter()
            .map(|d| (d.resource_type.clone(), d))
            .collect();
        inner.last_reap_sweep = snapshot.last_reap_sweep;
    }
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
pub(crate) struct Snapshot {
    pub(crate) resources: Vec<Resource>,
    pub(crate) lifecycles: Vec<DynamicResourceLifeCycle>,
    pub(crate) last_reap_sweep: Option<DateTime<Utc>>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_resources(&self) -> Result<Vec<Resource>, Error> {
        Ok(self.inner.lock().resources.values().cloned().collect())
    }

    async fn get_resource(&self, name: &str) -> Result<Resource, Error> {
        self.inner
            .lock()
            .resources
            .get(name)
            .cloned()
            .context(error::ResourceNotFound { name })
    }

    async fn create_resource(&self, mut resource: Resource) -> Result<Resource, Error> {
        let mut inner = self.inner.lock();
        if inner.resources.contains_key(&resource.name) {
            return error::ResourceExists { name: resource.name }.fail();
        }
        resource.version = 1;
        inner.resources.insert(resource.name.clone(), resource.clone());
        Ok(resource)
    }

    async fn update_resource(&self, mut resource: Resource) -> Result<Resource, Error> {
        let mut inner = self.inner.lock();
        let current = inner
            .resources
            .get(&resource.name)
            .context(error::ResourceNotFound { name: &resource.name })?;
        if current.version != resource.version {
            return error::VersionConflict {
                name: resource.name,
                expected: resource.version,
                found: current.version,
            }
            .fail();
        }
        resource.version += 1;
        inner.resources.insert(resource.name.clone(), resource.clone());
        Ok(resource)
    }

    async fn delete_resource(&self, name: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner
            .resources
            .remove(name)
            .map(|_| ())
            .context(error::ResourceNotFound { name })
    }

    async fn list_lifecycles(&self) -> Result<Vec<DynamicResourceLifeCycle>, Error> {
        Ok(self.inner.lock().lifecycles.values().cloned().collect())
    }

    async fn get_lifecycle(&self, resource_type: &str) -> Result<DynamicResourceLifeCycle, Error> {
        self.inner
            .lock()
            .lifecycles
            .get(resource_type)
            .cloned()
            .context(error::LifeCycleNotFound { resource_type })
    }

    async fn create_lifecycle(
        &self,
        mut drlc: DynamicResourceLifeCycle,
    ) -> Result<DynamicResourceLifeCycle, Error> {
        let mut inner = self.inner.lock();
        if inner.lifecycles.contains_key(&drlc.resource_type) {
            return error::LifeCycleExists {
                resource_type: drlc.resource_type,
            }
            .fail();
        }
        drlc.version = 1;
        inner
            .lifecycles
            .insert(drlc.resource_type.clone(), drlc.clone());
        Ok(drlc)
    }

    async fn update_lifecycle(
        &self,
        mut drlc: DynamicResourceLifeCycle,
    ) -> Result<DynamicResourceLifeCycle, Error> {
        let mut inner = self.inner.lock();
        let current = inner
            .lifecycles
            .get(&drlc.resource_type)
            .context(error::LifeCycleNotFound {
                resource_type: &drlc.resource_type,
            })?;
        if current.version != drlc.version {
            return error::VersionConflict {
                name: drlc.resource_type,
                expected: drlc.version,
                found: current.version,
            }
            .fail();
        }
        drlc.version += 1;
        inner
            .lifecycles
            .insert(drlc.resource_type.clone(), drlc.clone());
        Ok(drlc)
    }

    async fn delete_lifecycle(&self, resource_type: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner
            .lifecycles
            .remove(resource_type)
            .map(|_| ())
            .context(error::LifeCycleNotFound { resource_type })
    }

    async fn get_last_reap_sweep(&self) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.inner.lock().last_reap_sweep)
    }

    async fn set_last_reap_sweep(&self, at: DateTime<Utc>) -> Result<(), Error> {
        self.inner.lock().last_reap_sweep = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(name: &str) -> Resource {
        Resource::new(name, "project", "free", Utc::now())
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = MemoryStore::new();
        let created = store.create_resource(res("p1")).await.unwrap();
        assert_eq!(created.version, 1);
        let got = store.get_resource("p1").await.unwrap();
        assert_eq!(got.name, "p1");
    }

    #[tokio::test]
    async fn create_duplicate_fails() {
        let store = MemoryStore::new();
        store.create_resource(res("p1")).await.unwrap();
        let err = store.create_resource(res("p1")).await.unwrap_err();
        assert!(matches!(err, Error::ResourceExists { .. }));
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        let created = store.create_resource(res("p1")).await.unwrap();
        let mut stale = created.clone();
        stale.state = "busy".to_string();
        // simulate a concurrent writer bumping the version first
        let mut first = created.clone();
        first.owner = "alice".to_string();
        store.update_resource(first).await.unwrap();

        let err = store.update_resource(stale).await.unwrap_err();
        assert!(matches!(err, Error::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.delete_resource("nope").await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }
}
