//! Cooperative shutdown signal, shared by every background task (reaper,
//! request GC, dynamic updater, config watcher) and the HTTP server
//! (spec.md §9: "cancellation is by a shared stop signal passed at
//! construction").

use tokio::sync::watch;

/// Cloneable handle to a shutdown signal. Every background task `select!`s
/// on `wait()` alongside its own timer so it exits promptly once tripped.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Owns the sending half; dropped or `trigger()`-ed exactly once, typically
/// from the process's signal handler.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Builds a fresh (handle, signal) pair.
pub fn new() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl ShutdownHandle {
    /// Trips the signal; every cloned `Shutdown::wait()` resolves.
    pub fn trigger(&self) {
        tracing::info!("shutdown triggered");
        let _ = self.tx.send(true);
    }

    /// Waits for SIGINT (Ctrl+C) and triggers the signal.
    pub async fn wait_for_ctrl_c(self) {
        if tokio::signal::ctrl_c().await.is_ok() {
            self.trigger();
        }
    }
}

impl Shutdown {
    /// Resolves once `ShutdownHandle::trigger` has been called. Safe to await
    /// repeatedly and from multiple clones.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}
