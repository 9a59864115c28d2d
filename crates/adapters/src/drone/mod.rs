// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drones: hosts that run test-runner processes and keep their pidfiles.
//!
//! The scheduler never waits on a drone while deciding anything. It queues
//! [`DroneCall`]s during a cycle and flushes them with
//! [`Drone::execute_calls`]; at the start of the next cycle
//! [`Drone::refresh`] reports what happened through pidfiles.

mod local;

pub use local::LocalDrone;

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DroneError {
    #[error("drone {drone}: {source}")]
    Io {
        drone: String,
        #[source]
        source: std::io::Error,
    },
    #[error("drone {drone} cannot reach drone {target}")]
    UnknownTarget { drone: String, target: String },
    #[error("drone {0} is unreachable")]
    Unreachable(String),
}

/// One queued operation for a drone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DroneCall {
    /// Launch `command` in `working_directory`. The process is expected to
    /// write `working_directory/pidfile_name` itself.
    ExecuteCommand {
        command: Vec<String>,
        working_directory: PathBuf,
        log_file: Option<PathBuf>,
        pidfile_name: String,
    },
    KillProcess {
        pid: u32,
    },
    CopyFileOrDirectory {
        source: PathBuf,
        destination: PathBuf,
    },
    /// Append `contents` to `path`, creating it if needed.
    WriteToFile {
        path: PathBuf,
        contents: String,
    },
    /// Copy `source` on this drone to `destination` on drone `target`.
    SendFileTo {
        target: String,
        source: PathBuf,
        destination: PathBuf,
    },
}

/// What a drone reported at the start of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DroneRefresh {
    /// Raw text of each requested pidfile; `None` if it does not exist.
    pub pidfiles: HashMap<PathBuf, Option<String>>,
    /// Live pids among the processes the drone knows of.
    pub live_pids: BTreeSet<u32>,
    /// The pidfiles read again after the process listing, so a process that
    /// exited between the two reads shows its exit status here.
    pub pidfiles_second_read: HashMap<PathBuf, Option<String>>,
}

#[async_trait]
pub trait Drone: Send + Sync {
    fn name(&self) -> &str;

    /// Read the given pidfiles and list live processes.
    async fn refresh(&self, pidfile_paths: &[PathBuf]) -> Result<DroneRefresh, DroneError>;

    /// Run queued calls in order. A failing call is logged and does not stop
    /// the rest.
    async fn execute_calls(&self, calls: Vec<DroneCall>) -> Result<(), DroneError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{Drone, DroneCall, DroneError, DroneRefresh};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{BTreeSet, HashMap};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    struct FakeDroneState {
        calls: Vec<DroneCall>,
        pidfiles: HashMap<PathBuf, String>,
        second_read: HashMap<PathBuf, String>,
        live: BTreeSet<u32>,
        next_pid: u32,
        auto_start: bool,
        unreachable: bool,
    }

    /// In-memory drone. Launched commands get a pid and a running pidfile
    /// immediately; tests finish or lose them by hand.
    #[derive(Clone)]
    pub struct FakeDrone {
        name: String,
        inner: Arc<Mutex<FakeDroneState>>,
    }

    impl FakeDrone {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                inner: Arc::new(Mutex::new(FakeDroneState {
                    calls: Vec::new(),
                    pidfiles: HashMap::new(),
                    second_read: HashMap::new(),
                    live: BTreeSet::new(),
                    next_pid: 100,
                    auto_start: true,
                    unreachable: false,
                })),
            }
        }

        /// When false, launched commands never write a pidfile.
        pub fn set_auto_start(&self, auto_start: bool) {
            self.inner.lock().auto_start = auto_start;
        }

        pub fn set_unreachable(&self, unreachable: bool) {
            self.inner.lock().unreachable = unreachable;
        }

        pub fn calls(&self) -> Vec<DroneCall> {
            self.inner.lock().calls.clone()
        }

        /// Commands launched so far, with the pidfile each should write.
        pub fn executed(&self) -> Vec<(Vec<String>, PathBuf)> {
            self.inner
                .lock()
                .calls
                .iter()
                .filter_map(|call| match call {
                    DroneCall::ExecuteCommand { command, working_directory, pidfile_name, .. } => {
                        Some((command.clone(), working_directory.join(pidfile_name)))
                    }
                    _ => None,
                })
                .collect()
        }

        pub fn pidfile(&self, path: &Path) -> Option<String> {
            self.inner.lock().pidfiles.get(path).cloned()
        }

        pub fn set_pidfile(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
            self.inner.lock().pidfiles.insert(path.into(), text.into());
        }

        /// Make the second read of `path` differ from the first.
        pub fn set_second_read(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
            self.inner.lock().second_read.insert(path.into(), text.into());
        }

        pub fn set_live(&self, pid: u32, live: bool) {
            let mut inner = self.inner.lock();
            if live {
                inner.live.insert(pid);
            } else {
                inner.live.remove(&pid);
            }
        }

        /// Exit the process behind `pidfile` with the given status.
        pub fn finish(&self, pidfile: &Path, exit_status: i32, num_tests_failed: u32) {
            let mut inner = self.inner.lock();
            let Some(pid) = running_pid(&inner.pidfiles, pidfile) else {
                return;
            };
            inner.live.remove(&pid);
            inner.pidfiles.insert(
                pidfile.to_path_buf(),
                format!("{pid}\n{exit_status}\n{num_tests_failed}\n"),
            );
        }

        /// Exit every running process with the given status.
        pub fn finish_all(&self, exit_status: i32) {
            let paths: Vec<PathBuf> = self.inner.lock().pidfiles.keys().cloned().collect();
            for path in paths {
                self.finish(&path, exit_status, 0);
            }
        }

        /// Kill the process behind `pidfile` without it writing an exit status.
        pub fn lose(&self, pidfile: &Path) {
            let mut inner = self.inner.lock();
            if let Some(pid) = running_pid(&inner.pidfiles, pidfile) {
                inner.live.remove(&pid);
            }
        }

        pub fn live_pids(&self) -> BTreeSet<u32> {
            self.inner.lock().live.clone()
        }
    }

    fn running_pid(pidfiles: &HashMap<PathBuf, String>, path: &Path) -> Option<u32> {
        let text = pidfiles.get(path)?;
        let mut lines = text.lines();
        let pid = lines.next()?.trim().parse().ok()?;
        lines.next().is_none().then_some(pid)
    }

    #[async_trait]
    impl Drone for FakeDrone {
        fn name(&self) -> &str {
            &self.name
        }

        async fn refresh(&self, pidfile_paths: &[PathBuf]) -> Result<DroneRefresh, DroneError> {
            let inner = self.inner.lock();
            if inner.unreachable {
                return Err(DroneError::Unreachable(self.name.clone()));
            }
            let first: HashMap<PathBuf, Option<String>> = pidfile_paths
                .iter()
                .map(|p| (p.clone(), inner.pidfiles.get(p).cloned()))
                .collect();
            let second = pidfile_paths
                .iter()
                .map(|p| {
                    let text = inner.second_read.get(p).or_else(|| inner.pidfiles.get(p)).cloned();
                    (p.clone(), text)
                })
                .collect();
            Ok(DroneRefresh {
                pidfiles: first,
                live_pids: inner.live.clone(),
                pidfiles_second_read: second,
            })
        }

        async fn execute_calls(&self, calls: Vec<DroneCall>) -> Result<(), DroneError> {
            let mut inner = self.inner.lock();
            if inner.unreachable {
                return Err(DroneError::Unreachable(self.name.clone()));
            }
            for call in calls {
                match &call {
                    DroneCall::ExecuteCommand { working_directory, pidfile_name, .. }
                        if inner.auto_start =>
                    {
                        let pid = inner.next_pid;
                        inner.next_pid += 1;
                        inner.live.insert(pid);
                        inner.pidfiles.insert(working_directory.join(pidfile_name), format!("{pid}\n"));
                    }
                    DroneCall::KillProcess { pid } => {
                        inner.live.remove(pid);
                    }
                    _ => {}
                }
                inner.calls.push(call);
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDrone;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
