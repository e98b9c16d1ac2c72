//! Clock abstraction so Reaper/TTL/LifeSpan logic can be tested without
//! wall-clock sleeps (SPEC_FULL.md §8 ambient test tooling).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Anything that can tell the current time. Production uses `SystemClock`;
/// tests use `TestClock` to advance time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for deterministic tests.
#[derive(Clone)]
pub struct TestClock(Arc<RwLock<DateTime<Utc>>>);

impl TestClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(RwLock::new(start)))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.write() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.0.write();
        *guard = *guard + by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.read()
    }
}
