//! Reconciles the pool of each dynamic type against its min/max-size policy
//! (spec.md §4.5). Runs on a cadence (default 10 min, 0 disables); each DRLC
//! is reconciled as its own transaction against the ledger.

use crate::{clock::Clock, error::Error, ledger::Ledger};
use common_lib::types::Resource;
use std::{sync::Arc, time::Duration as StdDuration};

/// Default updater cadence (spec.md §4.5). `Duration::ZERO` disables the loop.
pub const DEFAULT_INTERVAL: StdDuration = StdDuration::from_secs(600);

pub struct DynamicResourceUpdater {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    interval: StdDuration,
}

impl DynamicResourceUpdater {
    pub fn new(ledger: Arc<Ledger>, clock: Arc<dyn Clock>, interval: StdDuration) -> Self {
        Self { ledger, clock, interval }
    }

    /// One reconciliation pass across every registered DRLC.
    pub async fn tick_once(&self) {
        for drlc in self.ledger.list_lifecycles() {
            if let Err(error) = self.reconcile_one(&drlc).await {
                tracing::error!(resource_type = %drlc.resource_type, %error, "dynamic updater pass failed");
            }
        }
    }

    async fn reconcile_one(&self, drlc: &common_lib::types::DynamicResourceLifeCycle) -> Result<(), Error> {
        let (all_free, busy, tombstoned) = self.ledger.count_by_type(&drlc.resource_type);
        // "free" is specifically "in InitialState, no owner" (spec.md §4.5 step 1);
        // an unowned resource sitting in some other state is neither pooled nor scaled here.
        let mut free: Vec<Resource> = all_free
            .into_iter()
            .filter(|r| r.state == drlc.initial_state)
            .collect();

        // Step 5: a free resource past its LifeSpan is tombstoned first, so the
        // scale-down/up arithmetic below sees it for what it now is.
        if let Some(life_span) = drlc.life_span {
            let life_span = chrono::Duration::from_std(life_span).unwrap_or(chrono::Duration::zero());
            let now = self.clock.now();
            let mut still_free = Vec::with_capacity(free.len());
            for r in free {
                if now - r.last_update > life_span {
                    if let Err(error) = self.ledger.tombstone_resource(&r.name).await {
                        tracing::error!(resource = %r.name, %error, "failed to tombstone aged-out resource");
                        still_free.push(r);
                    }
                } else {
                    still_free.push(r);
                }
            }
            free = still_free;
        }

        // Step 2: grow the pool to MinCount.
        let total_after_lifespan = free.len() + busy.len() + tombstoned.len();
        if (total_after_lifespan as u32) < drlc.min_count {
            let deficit = drlc.min_count - total_after_lifespan as u32;
            for _ in 0..deficit {
                let name = format!("{}-{}", drlc.resource_type, uuid::Uuid::new_v4());
                let resource = Resource::new(&name, &drlc.resource_type, &drlc.initial_state, self.clock.now());
                if let Err(error) = self.ledger.create_resource(resource).await {
                    tracing::error!(resource_type = %drlc.resource_type, %error, "failed to create dynamic resource");
                }
            }
        } else if total_after_lifespan > drlc.max_count as usize {
            // Step 3: shrink excess free resources, oldest LastUpdate first, never touching busy ones.
            let mut excess_candidates = free;
            excess_candidates.sort_by_key(|r| r.last_update);
            let excess = total_after_lifespan - drlc.max_count as usize;
            for resource in excess_candidates.into_iter().take(excess) {
                if let Err(error) = self.ledger.tombstone_resource(&resource.name).await {
                    tracing::error!(resource = %resource.name, %error, "failed to tombstone excess resource");
                }
            }
        }

        // Step 4: delete anything already tombstoned. Never delete a busy resource.
        for resource in tombstoned {
            if let Err(error) = self.ledger.delete_tombstoned_resource(&resource.name).await {
                tracing::error!(resource = %resource.name, %error, "failed to delete tombstoned resource");
            }
        }

        Ok(())
    }

    /// Runs forever on `interval` until `stop` fires. `interval == 0` disables the loop entirely.
    pub async fn run(self, stop: shutdown::Shutdown) {
        if self.interval.is_zero() {
            tracing::info!("dynamic resource updater disabled (interval=0)");
            return;
        }
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick_once().await,
                _ = stop.wait() => {
                    tracing::info!("dynamic resource updater stopping");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{SystemClock, TestClock};
    use chrono::Utc;
    use common_lib::types::DynamicResourceLifeCycle;
    use store::memory::MemoryStore;

    async fn new_ledger() -> Arc<Ledger> {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store, Arc::new(SystemClock), chrono::Duration::seconds(30));
        ledger.hydrate().await.unwrap();
        Arc::new(ledger)
    }

    async fn new_ledger_with_clock(clock: TestClock) -> Arc<Ledger> {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store, Arc::new(clock), chrono::Duration::seconds(30));
        ledger.hydrate().await.unwrap();
        Arc::new(ledger)
    }

    #[tokio::test]
    async fn scales_up_an_empty_pool_to_min_count() {
        let ledger = new_ledger().await;
        ledger
            .upsert_lifecycle(DynamicResourceLifeCycle {
                resource_type: "tproj".to_string(),
                initial_state: "free".to_string(),
                min_count: 2,
                max_count: 4,
                life_span: None,
                config: None,
                version: 0,
            })
            .await
            .unwrap();

        let updater = DynamicResourceUpdater::new(ledger.clone(), Arc::new(SystemClock), DEFAULT_INTERVAL);
        updater.tick_once().await;

        let (free, busy, tombstoned) = ledger.count_by_type("tproj");
        assert_eq!(free.len(), 2);
        assert!(busy.is_empty());
        assert!(tombstoned.is_empty());
        for r in &free {
            assert!(r.name.starts_with("tproj-"));
            assert_eq!(r.state, "free");
        }
    }

    #[tokio::test]
    async fn downscales_excess_free_resources_oldest_first() {
        let ledger = new_ledger().await;
        ledger
            .upsert_lifecycle(DynamicResourceLifeCycle {
                resource_type: "tproj".to_string(),
                initial_state: "free".to_string(),
                min_count: 0,
                max_count: 1,
                life_span: None,
                config: None,
                version: 0,
            })
            .await
            .unwrap();
        ledger
            .create_resource(Resource::new("tproj-a", "tproj", "free", Utc::now() - chrono::Duration::hours(2)))
            .await
            .unwrap();
        ledger
            .create_resource(Resource::new("tproj-b", "tproj", "free", Utc::now()))
            .await
            .unwrap();

        let updater = DynamicResourceUpdater::new(ledger.clone(), Arc::new(SystemClock), DEFAULT_INTERVAL);
        updater.tick_once().await;

        let a = ledger.get_resource("tproj-a").unwrap();
        let b = ledger.get_resource("tproj-b").unwrap();
        assert_eq!(a.state, "tombstone");
        assert_eq!(b.state, "free");
    }

    #[tokio::test]
    async fn never_tombstones_a_busy_resource() {
        let ledger = new_ledger().await;
        ledger
            .upsert_lifecycle(DynamicResourceLifeCycle {
                resource_type: "tproj".to_string(),
                initial_state: "free".to_string(),
                min_count: 0,
                max_count: 0,
                life_span: None,
                config: None,
                version: 0,
            })
            .await
            .unwrap();
        let mut busy = Resource::new("tproj-a", "tproj", "busy", Utc::now());
        busy.owner = "alice".to_string();
        ledger.create_resource(busy).await.unwrap();

        let updater = DynamicResourceUpdater::new(ledger.clone(), Arc::new(SystemClock), DEFAULT_INTERVAL);
        updater.tick_once().await;

        let still = ledger.get_resource("tproj-a").unwrap();
        assert_eq!(still.owner, "alice");
        assert_eq!(still.state, "busy");
    }

    /// spec.md §4.5 step 5: a free resource that has outlived its DRLC's
    /// `LifeSpan` is tombstoned on the next pass, deterministically driven
    /// by a `TestClock` rather than a wall-clock sleep.
    #[tokio::test]
    async fn tombstones_a_free_resource_past_its_lifespan() {
        let t0 = Utc::now();
        let clock = TestClock::new(t0);
        let ledger = new_ledger_with_clock(clock.clone()).await;
        ledger
            .upsert_lifecycle(DynamicResourceLifeCycle {
                resource_type: "tproj".to_string(),
                initial_state: "free".to_string(),
                min_count: 0,
                max_count: 1,
                life_span: Some(StdDuration::from_secs(3600)),
                config: None,
                version: 0,
            })
            .await
            .unwrap();
        ledger
            .create_resource(Resource::new("tproj-old", "tproj", "free", t0))
            .await
            .unwrap();

        // Not yet past LifeSpan: stays free.
        let updater = DynamicResourceUpdater::new(ledger.clone(), Arc::new(clock.clone()), DEFAULT_INTERVAL);
        updater.tick_once().await;
        assert_eq!(ledger.get_resource("tproj-old").unwrap().state, "free");

        // Advance the clock past LifeSpan: now tombstoned.
        clock.advance(chrono::Duration::seconds(3601));
        updater.tick_once().await;
        assert_eq!(ledger.get_resource("tproj-old").unwrap().state, "tombstone");
    }
}
