// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drone running on the scheduler's own machine.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{Drone, DroneCall, DroneError, DroneRefresh};

/// Spawns commands with `tokio::process` and reads pidfiles from the local
/// filesystem. Children are kept so they can be reaped; processes started
/// by an earlier scheduler instance are found through their pidfiles.
#[derive(Clone)]
pub struct LocalDrone {
    name: String,
    children: Arc<Mutex<Vec<Child>>>,
}

impl LocalDrone {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), children: Arc::new(Mutex::new(Vec::new())) }
    }

    fn io_err(&self, source: std::io::Error) -> DroneError {
        DroneError::Io { drone: self.name.clone(), source }
    }

    /// Reap finished children and return the pids still running.
    fn reap_children(&self) -> BTreeSet<u32> {
        let mut children = self.children.lock();
        children.retain_mut(|child| matches!(child.try_wait(), Ok(None)));
        children.iter().filter_map(Child::id).collect()
    }

    async fn spawn(
        &self,
        command: &[String],
        working_directory: &Path,
        log_file: Option<&Path>,
    ) -> Result<(), DroneError> {
        let Some((program, args)) = command.split_first() else {
            warn!(drone = %self.name, "refusing to execute an empty command");
            return Ok(());
        };
        tokio::fs::create_dir_all(working_directory).await.map_err(|e| self.io_err(e))?;
        let (stdout, stderr) = match log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_err(e))?;
                }
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| self.io_err(e))?;
                let err = file.try_clone().map_err(|e| self.io_err(e))?;
                (Stdio::from(file), Stdio::from(err))
            }
            None => (Stdio::null(), Stdio::null()),
        };
        let child = Command::new(program)
            .args(args)
            .current_dir(working_directory)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| self.io_err(e))?;
        info!(drone = %self.name, pid = ?child.id(), program = %program, "launched process");
        self.children.lock().push(child);
        Ok(())
    }

    async fn execute_call(&self, call: DroneCall) -> Result<(), DroneError> {
        match call {
            DroneCall::ExecuteCommand { command, working_directory, log_file, .. } => {
                self.spawn(&command, &working_directory, log_file.as_deref()).await
            }
            DroneCall::KillProcess { pid } => {
                match kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                    Ok(()) => info!(drone = %self.name, pid, "killed process"),
                    Err(e) => debug!(drone = %self.name, pid, error = %e, "kill failed"),
                }
                Ok(())
            }
            DroneCall::CopyFileOrDirectory { source, destination } => {
                self.copy(source, destination).await
            }
            DroneCall::WriteToFile { path, contents } => {
                use tokio::io::AsyncWriteExt;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_err(e))?;
                }
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await
                    .map_err(|e| self.io_err(e))?;
                file.write_all(contents.as_bytes()).await.map_err(|e| self.io_err(e))
            }
            DroneCall::SendFileTo { target, source, destination } => {
                // Every local drone shares this filesystem.
                debug!(drone = %self.name, %target, "sending file through local filesystem");
                self.copy(source, destination).await
            }
        }
    }

    async fn copy(&self, source: PathBuf, destination: PathBuf) -> Result<(), DroneError> {
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            debug!(drone = %self.name, source = %source.display(), "nothing to copy");
            return Ok(());
        }
        tokio::task::spawn_blocking(move || copy_tree(&source, &destination))
            .await
            .map_err(|e| self.io_err(std::io::Error::other(e)))?
            .map_err(|e| self.io_err(e))
    }
}

/// Copy a file, or a directory recursively, creating parents of `destination`.
fn copy_tree(source: &Path, destination: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::fs::create_dir_all(destination)?;
        for entry in std::fs::read_dir(source)? {
            let entry = entry?;
            copy_tree(&entry.path(), &destination.join(entry.file_name()))?;
        }
        return Ok(());
    }
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, destination)?;
    Ok(())
}

async fn read_pidfiles(paths: &[PathBuf]) -> HashMap<PathBuf, Option<String>> {
    let mut out = HashMap::with_capacity(paths.len());
    for path in paths {
        out.insert(path.clone(), tokio::fs::read_to_string(path).await.ok());
    }
    out
}

fn pid_of(text: &str) -> Option<u32> {
    text.lines().next()?.trim().parse().ok()
}

fn is_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[async_trait]
impl Drone for LocalDrone {
    fn name(&self) -> &str {
        &self.name
    }

    async fn refresh(&self, pidfile_paths: &[PathBuf]) -> Result<DroneRefresh, DroneError> {
        let pidfiles = read_pidfiles(pidfile_paths).await;
        let mut live_pids = self.reap_children();
        let recorded = pidfiles.values().flatten().filter_map(|text| pid_of(text));
        live_pids.extend(recorded.filter(|&pid| is_alive(pid)));
        let pidfiles_second_read = read_pidfiles(pidfile_paths).await;
        Ok(DroneRefresh { pidfiles, live_pids, pidfiles_second_read })
    }

    async fn execute_calls(&self, calls: Vec<DroneCall>) -> Result<(), DroneError> {
        for call in calls {
            if let Err(e) = self.execute_call(call).await {
                warn!(drone = %self.name, error = %e, "drone call failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
