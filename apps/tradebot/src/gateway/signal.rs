//! Single-slot notifications shared between tasks.

use std::sync::Arc;

use tokio::sync::{watch, Notify};

/// A best-effort notification with at most one pending signal.
///
/// Raising while a signal is already pending is absorbed, so a waiter wakes
/// once no matter how many raises happened since it last woke.
#[derive(Debug, Default)]
pub struct Signal {
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.notify.notify_one();
    }

    /// Wait for (and consume) the pending signal.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Latched shutdown flag. Once triggered every current and future waiter
/// observes it.
#[derive(Debug, Clone)]
pub struct Quit {
    tx: Arc<watch::Sender<bool>>,
}

impl Quit {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once set.
        let _ = rx.wait_for(|quit| *quit).await;
    }
}

impl Default for Quit {
    fn default() -> Self {
        Self::new()
    }
}
