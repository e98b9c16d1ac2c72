use core_engine::Ledger;
use std::sync::{atomic::AtomicBool, Arc};

/// Shared application state injected into every handler.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub hydrated: AtomicBool,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            hydrated: AtomicBool::new(false),
        }
    }

    pub fn mark_hydrated(&self) {
        self.hydrated.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(std::sync::atomic::Ordering::SeqCst)
    }
}
