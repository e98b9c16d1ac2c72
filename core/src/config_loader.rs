//! Periodic parse of the declared static resources + dynamic lifecycles,
//! diffed against the ledger and applied safely (spec.md §4.6). On startup
//! a load failure is fatal to the caller; on periodic reload errors are
//! logged and the previous config remains active (spec.md §7).

use crate::{error, error::Error, ledger::Ledger};
use chrono::Utc;
use common_lib::{config::BoskosConfig, types::Resource};
use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Duration as StdDuration};

/// Default config poll cadence (SPEC_FULL.md §4.6 ambient note).
pub const DEFAULT_INTERVAL: StdDuration = StdDuration::from_secs(10);

pub struct ConfigLoader {
    ledger: Arc<Ledger>,
    path: PathBuf,
    interval: StdDuration,
}

impl ConfigLoader {
    pub fn new(ledger: Arc<Ledger>, path: PathBuf, interval: StdDuration) -> Self {
        Self { ledger, path, interval }
    }

    async fn read_config(&self) -> Result<BoskosConfig, Error> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|source| Error::InvalidConfig {
            reason: format!("failed to read '{}': {}", self.path.display(), source),
        })?;
        BoskosConfig::parse(&raw).map_err(|source| Error::InvalidConfig {
            reason: format!("failed to parse '{}': {}", self.path.display(), source),
        })
    }

    /// Validates and applies one config snapshot (spec.md §4.6). Called both
    /// at startup (where a failure should be treated as fatal by the caller)
    /// and on every periodic reload (where the caller should log and keep
    /// running with the previous config still active).
    pub async fn load_once(&self) -> Result<(), Error> {
        let config = self.read_config().await?;
        self.validate(&config)?;
        self.apply(&config).await
    }

    /// Static resources take precedence by name; a name collision between
    /// static config and a dynamic pool is a load-time error (spec.md §4.6).
    fn validate(&self, config: &BoskosConfig) -> Result<(), Error> {
        let dynamic_types: HashSet<&str> = config.dynamic_types().collect();
        for group in &config.resources {
            if dynamic_types.contains(group.resource_type.as_str()) {
                return error::TypeCollision {
                    resource_type: group.resource_type.clone(),
                }
                .fail();
            }
        }
        for drlc in &config.dynamic_resource_life_cycles {
            if drlc.max_count < drlc.min_count {
                return error::InvalidConfig {
                    reason: format!(
                        "dynamic resource lifecycle '{}' has max_count {} < min_count {}",
                        drlc.resource_type, drlc.max_count, drlc.min_count
                    ),
                }
                .fail();
            }
        }
        Ok(())
    }

    async fn apply(&self, config: &BoskosConfig) -> Result<(), Error> {
        let declared: HashSet<&str> = config.static_names().collect();

        // Add any declared resource whose name is not yet in the ledger.
        for group in &config.resources {
            for name in &group.names {
                if self.ledger.get_resource(name).is_some() {
                    continue;
                }
                let resource = Resource::new(name, &group.resource_type, &group.state, Utc::now());
                if let Err(error) = self.ledger.create_resource(resource).await {
                    tracing::error!(resource = %name, %error, "config load: failed to add static resource");
                }
            }
        }

        // Remove any ledger resource not in the config, only if it's free;
        // busy resources are retained until their next free window (spec.md §4.6).
        let dynamic_types: HashSet<&str> = config.dynamic_types().collect();
        for resource in self.ledger.list_resources() {
            if dynamic_types.contains(resource.resource_type.as_str()) {
                continue; // owned by a DRLC, not static config
            }
            if declared.contains(resource.name.as_str()) {
                continue;
            }
            match self.ledger.delete_free_resource(&resource.name).await {
                Ok(()) => tracing::info!(resource = %resource.name, "config load: removed undeclared free resource"),
                Err(Error::ResourceBusy { .. }) => {
                    tracing::debug!(resource = %resource.name, "config load: deferring removal of busy resource");
                }
                Err(error) => tracing::error!(resource = %resource.name, %error, "config load: failed to remove resource"),
            }
        }

        // Upsert DRLCs; decreasing min/max is safe, the updater rebalances on its own cadence.
        for drlc in &config.dynamic_resource_life_cycles {
            if let Err(error) = self.ledger.upsert_lifecycle(drlc.clone()).await {
                tracing::error!(resource_type = %drlc.resource_type, %error, "config load: failed to upsert DRLC");
            }
        }

        // Removing a DRLC is allowed only once its pool has fully drained.
        let declared_dynamic: HashSet<&str> = dynamic_types;
        for existing in self.ledger.list_lifecycles() {
            if declared_dynamic.contains(existing.resource_type.as_str()) {
                continue;
            }
            match self.ledger.remove_lifecycle(&existing.resource_type).await {
                Ok(()) => tracing::info!(resource_type = %existing.resource_type, "config load: removed drained DRLC"),
                Err(Error::LifeCycleDraining { remaining, .. }) => {
                    tracing::debug!(resource_type = %existing.resource_type, remaining, "config load: DRLC still draining");
                }
                Err(error) => tracing::error!(resource_type = %existing.resource_type, %error, "config load: failed to remove DRLC"),
            }
        }

        Ok(())
    }

    /// Runs forever on `interval` until `stop` fires. Periodic reload errors
    /// are logged and the previous config remains active (spec.md §7).
    pub async fn run(self, stop: shutdown::Shutdown) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = self.load_once().await {
                        tracing::error!(%error, "config reload failed, keeping previous config active");
                    }
                }
                _ = stop.wait() => {
                    tracing::info!("config loader stopping");
                    return;
                }
            }
        }
    }
}
