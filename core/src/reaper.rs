//! Periodic scan that moves stale resources (no heartbeat within a
//! caller-supplied duration) to a caller-specified destination state and
//! records the previous owner (spec.md §4.4). The reaper makes no cleanup
//! decisions itself — callers (typically a janitor pipeline, out of scope
//! here) use the returned previous-owner map to locate a cleanup target.

use crate::{error::Error, ledger::Ledger};
use common_lib::types::ReaperPolicy;
use std::{sync::Arc, time::Duration as StdDuration};

/// Default reaper cadence (spec.md §4.4).
pub const DEFAULT_INTERVAL: StdDuration = StdDuration::from_secs(60);

pub struct Reaper {
    ledger: Arc<Ledger>,
    policies: Vec<ReaperPolicy>,
    interval: StdDuration,
}

impl Reaper {
    pub fn new(ledger: Arc<Ledger>, policies: Vec<ReaperPolicy>, interval: StdDuration) -> Self {
        Self {
            ledger,
            policies,
            interval,
        }
    }

    /// Runs one sweep across every registered expiration policy.
    pub async fn sweep_once(&self) -> Result<(), Error> {
        for policy in &self.policies {
            let expire = chrono::Duration::from_std(policy.expire).unwrap_or(chrono::Duration::zero());
            match self
                .ledger
                .reset(&policy.resource_type, &policy.from_state, expire, &policy.to_state)
                .await
            {
                Ok(reaped) if !reaped.is_empty() => {
                    tracing::info!(
                        resource_type = %policy.resource_type,
                        from_state = %policy.from_state,
                        to_state = %policy.to_state,
                        count = reaped.len(),
                        "reaped stale resources"
                    );
                }
                Ok(_) => {}
                Err(error) => {
                    // Background loops tolerate per-item errors and continue (spec.md §7).
                    tracing::error!(resource_type = %policy.resource_type, %error, "reaper sweep failed for policy");
                }
            }
        }
        self.ledger.record_reap_sweep().await
    }

    /// Runs forever on `interval` until `stop` fires.
    pub async fn run(self, stop: shutdown::Shutdown) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = self.sweep_once().await {
                        tracing::error!(%error, "reaper sweep failed");
                    }
                }
                _ = stop.wait() => {
                    tracing::info!("reaper stopping");
                    return;
                }
            }
        }
    }
}
