// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, the scheduling loop, shutdown.

mod startup;
pub use startup::{startup, startup_with};

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tb_core::SystemClock;
use tb_engine::{DispatchError, Dispatcher, RecoverySummary};
use tb_storage::{MemoryStore, StoreError};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;

/// A running scheduler bound to its state directory.
pub struct Daemon {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub store: Arc<MemoryStore>,
    pub dispatcher: Dispatcher<SystemClock>,
    /// What startup recovery found in the loaded snapshot.
    pub recovery: RecoverySummary,
}

impl Daemon {
    /// Run one scheduling cycle.
    pub async fn tick(&mut self) {
        self.dispatcher.tick().await;
    }

    /// Run cycles on the configured interval until `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        let period = self.dispatcher.context().config.tick_interval().max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "scheduler loop started");
        let mut cycles: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick().await;
                    cycles += 1;
                }
            }
        }
        info!(cycles, "scheduler loop stopped");
    }

    /// Flush pending drone calls and mail, save the lab snapshot and drop
    /// the PID file.
    ///
    /// Processes launched on drones keep running; the next startup
    /// reattaches to them through their pidfiles.
    pub async fn shutdown(mut self) -> Result<(), LifecycleError> {
        info!("shutting down scheduler");
        let ctx = self.dispatcher.context_mut();
        ctx.drones.execute_actions().await;
        ctx.email.send_queued_emails().await;

        let snapshot = self.config.snapshot_path();
        self.store.save(&snapshot)?;
        info!(path = %snapshot.display(), "saved lab snapshot");

        let lock_path = self.config.lock_path();
        if lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&lock_path) {
                warn!(path = %lock_path.display(), error = %e, "failed to remove PID file");
            }
        }
        info!("scheduler shutdown complete");
        Ok(())
    }
}

/// Cancel `cancel` on SIGINT or SIGTERM.
pub fn cancel_on_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                    _ = terminate.recv() => info!("received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "cannot listen for SIGINT");
                    return;
                }
                info!("received SIGINT");
            }
        }
        cancel.cancel();
    });
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: scheduler already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to read config {0}: {1}")]
    ConfigRead(PathBuf, #[source] std::io::Error),

    #[error("Invalid config {0}: {1}")]
    ConfigParse(PathBuf, #[source] toml::de::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scheduler error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
