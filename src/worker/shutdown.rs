//! Shutdown coordinator
//!
//! Translates process signals into the cancellation token the dispatcher
//! polls. Memory cleanup runs exactly once, no matter how many triggers
//! race.

use std::sync::Arc;
use std::sync::Once;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::MemoryGuard;

#[derive(Clone)]
pub struct ShutdownCoordinator {
    cancel: CancellationToken,
    guard: MemoryGuard,
    once: Arc<Once>,
}

impl ShutdownCoordinator {
    pub fn new(cancel: CancellationToken, guard: MemoryGuard) -> Self {
        Self {
            cancel,
            guard,
            once: Arc::new(Once::new()),
        }
    }

    /// Request shutdown: cancel, then one final memory cleanup. Idempotent.
    pub fn trigger(&self) {
        self.once.call_once(|| {
            info!("Shutdown triggered, running final cleanup");
            // Stop flag first, so no new job starts behind the cleanup.
            self.cancel.cancel();
            self.guard.cleanup();
        });
    }

    /// Listen for termination signals in the background
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            wait_for_signal().await;
            self.trigger();
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            info!("SIGTERM handler unavailable ({}), using Ctrl-C only", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl-C");
}
