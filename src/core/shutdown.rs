//! Generic Shutdown Coordination
//!
//! Provides a reusable shutdown coordination system that handles signal
//! handling and lets long-running loops observe a coordinated shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across the application
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> (Self, broadcast::Receiver<()>) {
        // Larger channel to avoid dropping bursts of shutdown signals
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);
        let shutdown_requested = Arc::new(AtomicBool::new(false));

        let coordinator = Self {
            shutdown_tx,
            shutdown_requested,
        };

        (coordinator, shutdown_rx)
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Trigger shutdown
    pub fn trigger_shutdown(&self) {
        // Release store synchronizes-with the Acquire loads in
        // is_shutdown_requested() across poll loops
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Install a ctrl-c handler that triggers this coordinator
    pub fn install_signal_handler(&self) {
        let tx = self.shutdown_tx.clone();
        let requested = self.shutdown_requested.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                requested.store(true, Ordering::Release);
                let _ = tx.send(());
            }
        });
    }
}
