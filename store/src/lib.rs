//! Persistence contract for resources and DRLC records (spec.md §4.2).
//!
//! `Store` is the durability boundary the `Ledger` writes through: every
//! successful mutation in memory is followed by a `Store` write, and a
//! `Store` failure rolls the in-memory change back (the ledger, not this
//! crate, owns that rollback policy). Optimistic concurrency is enforced
//! here via a per-record `version` counter so cross-process edits are
//! detected, matching the teacher's etcd-backed `Store` trait
//! (`common/src/store/etcd.rs`) generalized away from etcd specifically.

pub mod error;
pub mod file;
pub mod memory;

pub use error::Error;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_lib::types::{DynamicResourceLifeCycle, Resource};

/// Persistence contract consumed by the `Ledger`. Implementations must
/// provide at-least-once durability of each successful write before
/// acknowledging (spec.md §4.2).
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<Resource>, Error>;
    async fn get_resource(&self, name: &str) -> Result<Resource, Error>;
    async fn create_resource(&self, resource: Resource) -> Result<Resource, Error>;
    /// Updates a resource. `resource.version` must match the version currently
    /// on record or this returns `Error::VersionConflict`.
    async fn update_resource(&self, resource: Resource) -> Result<Resource, Error>;
    async fn delete_resource(&self, name: &str) -> Result<(), Error>;

    async fn list_lifecycles(&self) -> Result<Vec<DynamicResourceLifeCycle>, Error>;
    async fn get_lifecycle(&self, resource_type: &str) -> Result<DynamicResourceLifeCycle, Error>;
    async fn create_lifecycle(
        &self,
        drlc: DynamicResourceLifeCycle,
    ) -> Result<DynamicResourceLifeCycle, Error>;
    async fn update_lifecycle(
        &self,
        drlc: DynamicResourceLifeCycle,
    ) -> Result<DynamicResourceLifeCycle, Error>;
    async fn delete_lifecycle(&self, resource_type: &str) -> Result<(), Error>;

    /// Singleton record tracking the last reaper sweep timestamp (spec.md §6).
    async fn get_last_reap_sweep(&self) -> Result<Option<DateTime<Utc>>, Error>;
    async fn set_last_reap_sweep(&self, at: DateTime<Utc>) -> Result<(), Error>;
}
