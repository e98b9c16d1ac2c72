//! Authoritative in-memory state of resources and DRLCs (spec.md §4.1).
//! Guards all mutations under a single write lock; every committed mutation
//! is written through to the `Store` before being considered final — a
//! `Store` failure rolls the in-memory change back and surfaces to the
//! caller (spec.md §7 propagation policy).

use crate::{
    clock::Clock,
    error::{self, Error},
    queue::{QueueKey, RequestQueues},
};
use chrono::{DateTime, Duration, Utc};
use common_lib::types::{DynamicResourceLifeCycle, Resource, TOMBSTONE};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use store::Store;

#[derive(Default)]
struct LedgerState {
    resources: HashMap<String, Resource>,
    lifecycles: HashMap<String, DynamicResourceLifeCycle>,
    queues: RequestQueues,
}

/// Per-state, per-owner pool counts returned by `GET /metric` (spec.md §6).
#[derive(Debug, Default, serde::Serialize)]
pub struct PoolMetric {
    pub state: HashMap<String, u32>,
    pub owner: HashMap<String, u32>,
}

pub struct Ledger {
    state: RwLock<LedgerState>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    /// Default request TTL (spec.md §4.3, default 30s).
    request_ttl: Duration,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, request_ttl: Duration) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            store,
            clock,
            request_ttl,
        }
    }

    /// Rehydrates from the `Store` on startup (spec.md §4.1).
    pub async fn hydrate(&self) -> Result<(), Error> {
        let resources = self.store.list_resources().await?;
        let lifecycles = self.store.list_lifecycles().await?;
        let mut guard = self.state.write();
        guard.resources = resources.into_iter().map(|r| (r.name.clone(), r)).collect();
        guard.lifecycles = lifecycles
            .into_iter()
            .map(|d| (d.resource_type.clone(), d))
            .collect();
        tracing::info!(
            resources = guard.resources.len(),
            lifecycles = guard.lifecycles.len(),
            "ledger hydrated from store"
        );
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Selects the first free, non-tombstoned resource of `resource_type` in
    /// `state`, deterministically by sorted name (spec.md §4.1 tie-breaking).
    fn pick_candidate(resources: &HashMap<String, Resource>, resource_type: &str, state: &str) -> Option<String> {
        let mut names: Vec<&str> = resources
            .values()
            .filter(|r| r.resource_type == resource_type && r.state == state && r.is_free() && !r.is_tombstoned())
            .map(|r| r.name.as_str())
            .collect();
        names.sort_unstable();
        names.first().map(|s| s.to_string())
    }

    /// `Acquire(type, state, dest, owner, requestID)` (spec.md §4.1).
    pub async fn acquire(
        &self,
        resource_type: &str,
        state: &str,
        dest: &str,
        owner: &str,
        request_id: &str,
    ) -> Result<Resource, Error> {
        if state == TOMBSTONE {
            return error::NoCandidate {
                resource_type: resource_type.to_string(),
                state: state.to_string(),
            }
            .fail();
        }
        let now = self.now();
        let key: QueueKey = (resource_type.to_string(), state.to_string());

        let (old, new) = {
            let mut guard = self.state.write();
            guard.queues.gc_expired(now, self.request_ttl);

            // Empty-queue fast path (spec.md §9 open question, resolved in SPEC_FULL.md §9).
            let queue_empty = guard.queues.is_empty(&key, now, self.request_ttl);
            if !queue_empty && !guard.queues.is_head(&key, request_id, now, self.request_ttl) {
                guard.queues.enqueue(key.clone(), request_id, now, self.request_ttl);
                return error::NotHeadOfQueue {
                    resource_type: resource_type.to_string(),
                    state: state.to_string(),
                    request_id: request_id.to_string(),
                }
                .fail();
            }

            let candidate = Self::pick_candidate(&guard.resources, resource_type, state);
            let name = match candidate {
                Some(name) => name,
                None => {
                    guard.queues.enqueue(key, request_id, now, self.request_ttl);
                    return error::NoCandidate {
                        resource_type: resource_type.to_string(),
                        state: state.to_string(),
                    }
                    .fail();
                }
            };

            let old = guard.resources.get(&name).expect("candidate exists").clone();
            let mut new = old.clone();
            new.owner = owner.to_string();
            new.state = dest.to_string();
            new.last_update = now;
            guard.resources.insert(name, new.clone());
            guard.queues.remove(&key, request_id);
            (old, new)
        };

        self.commit_or_rollback(old, new, Some((key, request_id.to_string(), now)))
            .await
    }

    /// Writes `new` through the store; on failure restores `old` in memory
    /// and, if supplied, re-enqueues the request so a retry doesn't lose its
    /// slot over a transient store failure.
    async fn commit_or_rollback(
        &self,
        old: Resource,
        new: Resource,
        requeue_on_fail: Option<(QueueKey, String, DateTime<Utc>)>,
    ) -> Result<Resource, Error> {
        match self.store.update_resource(new).await {
            Ok(persisted) => {
                let mut guard = self.state.write();
                guard.resources.insert(persisted.name.clone(), persisted.clone());
                Ok(persisted)
            }
            Err(source) => {
                tracing::error!(resource = %old.name, %source, "store write failed, rolling back");
                let mut guard = self.state.write();
                guard.resources.insert(old.name.clone(), old);
                if let Some((key, request_id, now)) = requeue_on_fail {
                    guard.queues.enqueue(key, &request_id, now, self.request_ttl);
                }
                Err(source.into())
            }
        }
    }

    /// `AcquireByState(state, dest, owner, names) → []Resource | error`,
    /// all-or-nothing (spec.md §4.1).
    pub async fn acquire_by_state(
        &self,
        state: &str,
        dest: &str,
        owner: &str,
        names: &[String],
    ) -> Result<Vec<Resource>, Error> {
        let now = self.now();
        let (olds, news) = {
            let mut guard = self.state.write();
            let mut olds = Vec::with_capacity(names.len());
            for name in names {
                let current = guard
                    .resources
                    .get(name)
                    .cloned()
                    .ok_or_else(|| error::NotFound { name: name.clone() }.build())?;
                if !current.is_free() {
                    return error::ResourceBusy {
                        name: name.clone(),
                        owner: current.owner.clone(),
                    }
                    .fail();
                }
                if current.state != state || current.is_tombstoned() {
                    return error::StateMismatch {
                        name: name.clone(),
                        expected_state: state.to_string(),
                        actual_state: current.state.clone(),
                    }
                    .fail();
                }
                olds.push(current);
            }
            let mut news = Vec::with_capacity(olds.len());
            for old in &olds {
                let mut new = old.clone();
                new.owner = owner.to_string();
                new.state = dest.to_string();
                new.last_update = now;
                guard.resources.insert(new.name.clone(), new.clone());
                news.push(new);
            }
            (olds, news)
        };

        let mut acquired = Vec::with_capacity(news.len());
        let mut committed_olds = Vec::with_capacity(news.len());
        for (old, new) in olds.into_iter().zip(news.into_iter()) {
            match self.store.update_resource(new).await {
                Ok(persisted) => {
                    let mut guard = self.state.write();
                    guard.resources.insert(persisted.name.clone(), persisted.clone());
                    acquired.push(persisted);
                    committed_olds.push(old);
                }
                Err(source) => {
                    // roll back everything acquired so far in this call, all-or-nothing.
                    let mut guard = self.state.write();
                    guard.resources.insert(old.name.clone(), old);
                    for restore in committed_olds {
                        guard.resources.insert(restore.name.clone(), restore);
                    }
                    return Err(source.into());
                }
            }
        }
        Ok(acquired)
    }

    /// `Release(name, dest, owner)` (spec.md §4.1).
    pub async fn release(&self, name: &str, dest: &str, owner: &str) -> Result<Resource, Error> {
        let now = self.now();
        let (old, new) = {
            let mut guard = self.state.write();
            let current = guard
                .resources
                .get(name)
                .cloned()
                .ok_or_else(|| error::NotFound { name: name.to_string() }.build())?;
            if current.owner != owner {
                return error::Unauthorized {
                    name: name.to_string(),
                    owner: owner.to_string(),
                    actual_owner: current.owner,
                }
                .fail();
            }
            let mut new = current.clone();
            new.owner = String::new();
            new.state = dest.to_string();
            new.last_update = now;
            guard.resources.insert(name.to_string(), new.clone());
            (current, new)
        };
        self.commit_or_rollback(old, new, None).await
    }

    /// `Update(name, owner, state, userDataPatch)` — heartbeat (spec.md §4.1).
    pub async fn update(
        &self,
        name: &str,
        owner: &str,
        state: &str,
        user_data_patch: &HashMap<String, Option<String>>,
    ) -> Result<Resource, Error> {
        let now = self.now();
        let (old, new) = {
            let mut guard = self.state.write();
            let current = guard
                .resources
                .get(name)
                .cloned()
                .ok_or_else(|| error::NotFound { name: name.to_string() }.build())?;
            if current.owner != owner {
                return error::Unauthorized {
                    name: name.to_string(),
                    owner: owner.to_string(),
                    actual_owner: current.owner,
                }
                .fail();
            }
            if current.state != state {
                return error::StateMismatch {
                    name: name.to_string(),
                    expected_state: state.to_string(),
                    actual_state: current.state.clone(),
                }
                .fail();
            }
            let mut new = current.clone();
            new.last_update = now;
            new.apply_user_data_patch(user_data_patch);
            guard.resources.insert(name.to_string(), new.clone());
            (current, new)
        };
        self.commit_or_rollback(old, new, None).await
    }

    /// `Reset(type, state, expire, dest) → map[name]previousOwner` (spec.md §4.1).
    /// Idempotent: a resource moved out of `state` by one call is never a
    /// candidate again without a fresh Acquire into that state.
    pub async fn reset(
        &self,
        resource_type: &str,
        state: &str,
        expire: Duration,
        dest: &str,
    ) -> Result<HashMap<String, String>, Error> {
        let now = self.now();
        let pairs: Vec<(Resource, Resource)> = {
            let mut guard = self.state.write();
            let stale: Vec<String> = guard
                .resources
                .values()
                .filter(|r| {
                    r.resource_type == resource_type
                        && r.state == state
                        && !r.owner.is_empty()
                        && now - r.last_update > expire
                })
                .map(|r| r.name.clone())
                .collect();

            stale
                .into_iter()
                .map(|name| {
                    let old = guard.resources.get(&name).expect("exists").clone();
                    let mut new = old.clone();
                    new.owner = String::new();
                    new.state = dest.to_string();
                    new.last_update = now;
                    guard.resources.insert(name, new.clone());
                    (old, new)
                })
                .collect()
        };

        let mut result = HashMap::new();
        for (old, new) in pairs {
            let name = new.name.clone();
            match self.store.update_resource(new).await {
                Ok(persisted) => {
                    let mut guard = self.state.write();
                    guard.resources.insert(persisted.name.clone(), persisted);
                    result.insert(name, old.owner);
                }
                Err(source) => {
                    tracing::error!(resource = %name, %source, "reset: store write failed, skipping");
                    let mut guard = self.state.write();
                    guard.resources.insert(old.name.clone(), old);
                }
            }
        }
        Ok(result)
    }

    /// All resources currently in the ledger (used by list/metric endpoints).
    pub fn list_resources(&self) -> Vec<Resource> {
        self.state.read().resources.values().cloned().collect()
    }

    pub fn get_resource(&self, name: &str) -> Option<Resource> {
        self.state.read().resources.get(name).cloned()
    }

    /// `GET /metric`: pool counts by state and by owner for a given type.
    pub fn metric(&self, resource_type: &str) -> PoolMetric {
        let guard = self.state.read();
        let mut metric = PoolMetric::default();
        for r in guard.resources.values().filter(|r| r.resource_type == resource_type) {
            *metric.state.entry(r.state.clone()).or_insert(0) += 1;
            let owner = if r.owner.is_empty() { "".to_string() } else { r.owner.clone() };
            *metric.owner.entry(owner).or_insert(0) += 1;
        }
        metric
    }

    pub fn list_lifecycles(&self) -> Vec<DynamicResourceLifeCycle> {
        self.state.read().lifecycles.values().cloned().collect()
    }

    pub fn get_lifecycle(&self, resource_type: &str) -> Option<DynamicResourceLifeCycle> {
        self.state.read().lifecycles.get(resource_type).cloned()
    }

    /// Counts of {free, busy, tombstoned} resources of `resource_type`
    /// (spec.md §4.5 step 1).
    pub fn count_by_type(&self, resource_type: &str) -> (Vec<Resource>, Vec<Resource>, Vec<Resource>) {
        let guard = self.state.read();
        let mut free = Vec::new();
        let mut busy = Vec::new();
        let mut tombstoned = Vec::new();
        for r in guard.resources.values().filter(|r| r.resource_type == resource_type) {
            if r.is_tombstoned() {
                tombstoned.push(r.clone());
            } else if r.is_free() {
                free.push(r.clone());
            } else {
                busy.push(r.clone());
            }
        }
        (free, busy, tombstoned)
    }

    /// Creates a brand-new resource (config load §4.6 or dynamic updater §4.5
    /// step 2), persisting through the store first so a name is never
    /// observable in memory without a durable backing record.
    pub async fn create_resource(&self, resource: Resource) -> Result<Resource, Error> {
        let persisted = self.store.create_resource(resource).await?;
        self.state
            .write()
            .resources
            .insert(persisted.name.clone(), persisted.clone());
        Ok(persisted)
    }

    /// Deletes a resource that is currently free — the only time config
    /// removal may delete one (spec.md §4.6, I4).
    pub async fn delete_free_resource(&self, name: &str) -> Result<(), Error> {
        let current = self
            .get_resource(name)
            .ok_or_else(|| error::NotFound { name: name.to_string() }.build())?;
        if !current.is_free() {
            return error::ResourceBusy {
                name: name.to_string(),
                owner: current.owner,
            }
            .fail();
        }
        self.store.delete_resource(name).await?;
        self.state.write().resources.remove(name);
        Ok(())
    }

    /// Deletes a resource that is tombstoned — the only time the dynamic
    /// updater may delete one (spec.md §4.5 step 4).
    pub async fn delete_tombstoned_resource(&self, name: &str) -> Result<(), Error> {
        let current = self
            .get_resource(name)
            .ok_or_else(|| error::NotFound { name: name.to_string() }.build())?;
        if !current.is_tombstoned() {
            return error::StateMismatch {
                name: name.to_string(),
                expected_state: TOMBSTONE.to_string(),
                actual_state: current.state,
            }
            .fail();
        }
        self.store.delete_resource(name).await?;
        self.state.write().resources.remove(name);
        Ok(())
    }

    /// Marks a free resource as `tombstone` (downscale, spec.md §4.5 step 3,
    /// or a free resource past its `LifeSpan`, step 5).
    pub async fn tombstone_resource(&self, name: &str) -> Result<Resource, Error> {
        let now = self.now();
        let (old, new) = {
            let mut guard = self.state.write();
            let current = guard
                .resources
                .get(name)
                .cloned()
                .ok_or_else(|| error::NotFound { name: name.to_string() }.build())?;
            if !current.is_free() {
                return error::ResourceBusy {
                    name: name.to_string(),
                    owner: current.owner,
                }
                .fail();
            }
            let mut new = current.clone();
            new.state = TOMBSTONE.to_string();
            new.last_update = now;
            guard.resources.insert(name.to_string(), new.clone());
            (current, new)
        };
        self.commit_or_rollback(old, new, None).await
    }

    /// Upserts a DRLC record (spec.md §4.6: "upsert records").
    pub async fn upsert_lifecycle(&self, drlc: DynamicResourceLifeCycle) -> Result<DynamicResourceLifeCycle, Error> {
        let existing = self.get_lifecycle(&drlc.resource_type);
        let persisted = match existing {
            Some(current) => {
                let mut next = drlc;
                next.version = current.version;
                self.store.update_lifecycle(next).await?
            }
            None => self.store.create_lifecycle(drlc).await?,
        };
        self.state
            .write()
            .lifecycles
            .insert(persisted.resource_type.clone(), persisted.clone());
        Ok(persisted)
    }

    /// Removes a DRLC, only valid once its pool has fully drained (spec.md §4.6).
    pub async fn remove_lifecycle(&self, resource_type: &str) -> Result<(), Error> {
        let (free, busy, tombstoned) = self.count_by_type(resource_type);
        let remaining = free.len() + busy.len() + tombstoned.len();
        if remaining > 0 {
            return error::LifeCycleDraining {
                resource_type: resource_type.to_string(),
                remaining,
            }
            .fail();
        }
        self.store.delete_lifecycle(resource_type).await?;
        self.state.write().lifecycles.remove(resource_type);
        Ok(())
    }

    /// Periodic request-queue GC sweep (spec.md §4.3, default every minute).
    pub fn gc_requests(&self) {
        let now = self.now();
        self.state.write().queues.gc_expired(now, self.request_ttl);
    }

    pub fn request_ttl(&self) -> Duration {
        self.request_ttl
    }

    pub async fn last_reap_sweep(&self) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.store.get_last_reap_sweep().await?)
    }

    pub async fn record_reap_sweep(&self) -> Result<(), Error> {
        Ok(self.store.set_last_reap_sweep(self.now()).await?)
    }
}
