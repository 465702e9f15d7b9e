//! Shutdown fan-out.
//!
//! One `Shutdown` lives in `main`. The HTTP server and the abuse tracker's
//! cleanup task each hold a receiver; a single `trigger` stops both.

use std::future::Future;

use tokio::sync::broadcast;

pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for one long-running task. Subscribe before triggering;
    /// late subscribers miss the signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every current subscriber. Repeated calls are harmless.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Wait for `signal`, then trigger. Returns how many tasks were notified.
    pub async fn trigger_on<F>(&self, signal: F) -> usize
    where
        F: Future<Output = ()>,
    {
        signal.await;
        let listening = self.tx.receiver_count();
        tracing::info!(tasks = listening, "Shutting down");
        self.trigger();
        listening
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
