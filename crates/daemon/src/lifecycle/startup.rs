// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler startup: lock, load, wire drones and mail, recover.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use fs2::FileExt;
use tb_adapters::{Drone, EmailNotificationManager, LocalDrone, MailTransport, SendmailTransport};
use tb_core::SystemClock;
use tb_engine::{Dispatcher, DroneManager, DroneSpec, SchedulerContext};
use tb_storage::{MemoryStore, Store};
use tracing::info;

use super::{Daemon, LifecycleError};
use crate::config::Config;

/// Start against local drones and the system mailer.
pub async fn startup(config: Config) -> Result<Daemon, LifecycleError> {
    let drones = config
        .drone_capacities()
        .map(|(name, max_processes)| DroneSpec {
            drone: Arc::new(LocalDrone::new(name)) as Arc<dyn Drone>,
            max_processes,
        })
        .collect();
    let results: Arc<dyn Drone> = Arc::new(LocalDrone::new(config.results.drone.clone()));
    let transport: Arc<dyn MailTransport> = Arc::new(SendmailTransport::new(config.sendmail_path()));
    startup_with(config, drones, results, transport).await
}

/// Start with the given drones and mail transport.
pub async fn startup_with(
    config: Config,
    drones: Vec<DroneSpec>,
    results: Arc<dyn Drone>,
    transport: Arc<dyn MailTransport>,
) -> Result<Daemon, LifecycleError> {
    // Lock FIRST: only one scheduler may drive a lab snapshot.
    std::fs::create_dir_all(config.state_dir())?;
    let lock_file = acquire_lock(&config.lock_path())?;

    let store = Arc::new(MemoryStore::load(&config.snapshot_path())?);
    let drones = DroneManager::new(drones, results, &config.results.dir, &config.paths.drone_root)?;
    let email =
        EmailNotificationManager::new(config.notify.from.clone(), &config.notify.to, transport);
    let shared: Arc<dyn Store> = store.clone();
    let ctx = SchedulerContext::new(shared, drones, email, config.scheduler.clone(), SystemClock);

    let mut dispatcher = Dispatcher::new(ctx);
    let recovery = dispatcher.recover()?;
    info!(
        state_dir = %config.state_dir().display(),
        agents = dispatcher.agents().len(),
        "scheduler started"
    );
    Ok(Daemon { config, lock_file, store, dispatcher, recovery })
}

/// Take the exclusive lock on the PID file and write our PID into it.
fn acquire_lock(path: &Path) -> Result<File, LifecycleError> {
    // Open without truncating: the file may belong to a running scheduler.
    let mut lock_file =
        std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
