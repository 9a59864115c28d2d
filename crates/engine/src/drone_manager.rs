// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drone selection, pidfile bookkeeping and the per-drone call queues.
//!
//! Everything the scheduler wants a drone to do is queued here during a
//! cycle and flushed by [`DroneManager::execute_actions`]. Pidfile contents
//! and process liveness are cached by [`DroneManager::refresh`] at the start
//! of the cycle, so every decision within a cycle sees one snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tb_adapters::{Drone, DroneCall};
use tb_core::{PidfileContents, PidfileError, PidfileId, Process, RunState};
use tracing::{debug, info, warn};

use crate::error::DispatchError;

/// Command argument replaced by the absolute working directory at launch.
pub const WORKING_DIRECTORY: &str = "{working_directory}";

/// Relative directory holding per-task scratch directories on a drone.
const TEMPORARY_DIRECTORY: &str = "drone_tmp";

/// A drone and its process capacity.
pub struct DroneSpec {
    pub drone: Arc<dyn Drone>,
    pub max_processes: usize,
}

/// One process launch.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub command: Vec<String>,
    /// Relative to the drone root.
    pub working_directory: String,
    pub pidfile_name: String,
    /// Relative to the drone root.
    pub log_file: Option<String>,
    /// Capacity charged to the drone while the process runs.
    pub num_processes: usize,
    /// Run on the same drone as the process behind this pidfile.
    pub paired_with: Option<PidfileId>,
}

struct DroneSlot {
    drone: Arc<dyn Drone>,
    max_processes: usize,
    active_processes: usize,
    queued: Vec<DroneCall>,
}

impl DroneSlot {
    fn usage(&self) -> f64 {
        if self.max_processes == 0 {
            return f64::INFINITY;
        }
        self.active_processes as f64 / self.max_processes as f64
    }
}

struct Registration {
    /// Drone the pidfile lives on, once known.
    drone: Option<String>,
    num_processes: usize,
    refs: usize,
}

type ContentsCache = HashMap<PidfileId, Result<PidfileContents, PidfileError>>;

pub struct DroneManager {
    drones: BTreeMap<String, DroneSlot>,
    results_drone: Arc<dyn Drone>,
    results_queue: Vec<DroneCall>,
    results_dir: PathBuf,
    drone_root: PathBuf,
    registered: HashMap<PidfileId, Registration>,
    contents: ContentsCache,
    second_read: ContentsCache,
    live: HashSet<Process>,
    temporary_counter: u64,
}

impl DroneManager {
    /// `drone_root` is the install directory on every drone; `results_dir`
    /// is the repository root on the results drone.
    pub fn new(
        drones: Vec<DroneSpec>,
        results_drone: Arc<dyn Drone>,
        results_dir: impl Into<PathBuf>,
        drone_root: impl Into<PathBuf>,
    ) -> Result<Self, DispatchError> {
        if drones.is_empty() {
            return Err(DispatchError::NoDrones);
        }
        let drones = drones
            .into_iter()
            .map(|spec| {
                let slot = DroneSlot {
                    drone: spec.drone,
                    max_processes: spec.max_processes,
                    active_processes: 0,
                    queued: Vec::new(),
                };
                (slot.drone.name().to_string(), slot)
            })
            .collect();
        Ok(Self {
            drones,
            results_drone,
            results_queue: Vec::new(),
            results_dir: results_dir.into(),
            drone_root: drone_root.into(),
            registered: HashMap::new(),
            contents: HashMap::new(),
            second_read: HashMap::new(),
            live: HashSet::new(),
            temporary_counter: 0,
        })
    }

    pub fn drone_names(&self) -> impl Iterator<Item = &str> {
        self.drones.keys().map(String::as_str)
    }

    pub fn results_drone_name(&self) -> &str {
        self.results_drone.name()
    }

    /// Read every registered pidfile and the live process list from each drone.
    pub async fn refresh(&mut self) {
        let paths: Vec<PathBuf> =
            self.registered.keys().map(|id| id.path().to_path_buf()).collect();
        self.contents.clear();
        self.second_read.clear();
        self.live.clear();
        for (name, slot) in &self.drones {
            let refresh = match slot.drone.refresh(&paths).await {
                Ok(refresh) => refresh,
                Err(e) => {
                    warn!(drone = %name, error = %e, "drone refresh failed");
                    continue;
                }
            };
            self.live.extend(refresh.live_pids.iter().map(|&pid| Process::new(name.clone(), pid)));
            absorb(&mut self.contents, &self.registered, name, refresh.pidfiles);
            absorb(&mut self.second_read, &self.registered, name, refresh.pidfiles_second_read);
        }
        for (id, registration) in self.registered.iter_mut() {
            if registration.drone.is_none() {
                if let Some(Ok(PidfileContents { process: Some(process), .. })) = self.contents.get(id)
                {
                    registration.drone = Some(process.drone.clone());
                }
            }
        }
        self.recount_active();
        debug!(pidfiles = paths.len(), live = self.live.len(), "refreshed drones");
    }

    /// Active processes per drone: the charge of every registered pidfile
    /// whose process is live or has not started yet.
    fn recount_active(&mut self) {
        for slot in self.drones.values_mut() {
            slot.active_processes = 0;
        }
        for (id, registration) in &self.registered {
            if registration.num_processes == 0 {
                continue;
            }
            let owner = match self.contents.get(id) {
                None => registration.drone.clone(),
                Some(Err(_)) => None,
                Some(Ok(contents)) => match (contents.state(), &contents.process) {
                    (RunState::NotYetRun, _) => registration.drone.clone(),
                    (RunState::Running, Some(process)) if self.live.contains(process) => {
                        Some(process.drone.clone())
                    }
                    _ => None,
                },
            };
            if let Some(slot) = owner.and_then(|name| self.drones.get_mut(&name)) {
                slot.active_processes += registration.num_processes;
            }
        }
    }

    pub fn active_processes(&self, drone: &str) -> Option<usize> {
        self.drones.get(drone).map(|slot| slot.active_processes)
    }

    /// Largest free capacity of any single drone.
    pub fn max_runnable_processes(&self) -> usize {
        self.drones
            .values()
            .map(|slot| slot.max_processes.saturating_sub(slot.active_processes))
            .max()
            .unwrap_or(0)
    }

    /// The least loaded drone that can take `num_processes` more; if none
    /// can, the least loaded drone overall.
    pub fn choose_drone_for_execution(&self, num_processes: usize) -> &str {
        let mut by_usage: Vec<(&String, &DroneSlot)> = self.drones.iter().collect();
        by_usage.sort_by(|a, b| a.1.usage().total_cmp(&b.1.usage()));
        let fits = by_usage
            .iter()
            .find(|(_, slot)| slot.active_processes + num_processes <= slot.max_processes);
        match fits.or(by_usage.first()) {
            Some(&(name, _)) => name.as_str(),
            None => self.results_drone.name(),
        }
    }

    /// Start tracking a pidfile written by a process launched elsewhere,
    /// such as one that survived a scheduler restart.
    pub fn attach_pidfile(&mut self, id: &PidfileId, num_processes: usize) {
        self.register(id.clone(), None, num_processes);
    }

    pub fn unregister_pidfile(&mut self, id: &PidfileId) {
        if let Some(registration) = self.registered.get_mut(id) {
            registration.refs = registration.refs.saturating_sub(1);
            if registration.refs == 0 {
                self.registered.remove(id);
            }
        }
    }

    pub fn is_registered(&self, id: &PidfileId) -> bool {
        self.registered.contains_key(id)
    }

    fn register(&mut self, id: PidfileId, drone: Option<String>, num_processes: usize) {
        let registration = self.registered.entry(id).or_insert(Registration {
            drone: None,
            num_processes: 0,
            refs: 0,
        });
        registration.refs += 1;
        registration.num_processes = registration.num_processes.max(num_processes);
        if drone.is_some() {
            registration.drone = drone;
        }
    }

    /// Contents cached by the last refresh. Unknown pidfiles read as not yet run.
    pub fn get_pidfile_contents(
        &self,
        id: &PidfileId,
        use_second_read: bool,
    ) -> Result<PidfileContents, PidfileError> {
        let cache = if use_second_read { &self.second_read } else { &self.contents };
        cache.get(id).cloned().unwrap_or_else(|| Ok(PidfileContents::default()))
    }

    /// Drone holding a pidfile: where it was launched, or where the last
    /// refresh found it.
    fn drone_of(&self, id: &PidfileId) -> Option<String> {
        if let Some(drone) = self.registered.get(id).and_then(|r| r.drone.clone()) {
            return Some(drone);
        }
        match self.contents.get(id) {
            Some(Ok(PidfileContents { process: Some(process), .. })) => Some(process.drone.clone()),
            _ => None,
        }
    }

    pub fn is_process_running(&self, process: &Process) -> bool {
        self.live.contains(process)
    }

    /// Placeholder process for runs whose real process was never seen.
    pub fn dummy_process(&self) -> Process {
        Process::new(self.results_drone.name(), 0)
    }

    /// Queue a launch and return the pidfile the process will write.
    pub fn execute_command(&mut self, request: LaunchRequest) -> PidfileId {
        let paired_drone = request.paired_with.as_ref().and_then(|id| self.drone_of(id));
        let drone = match paired_drone {
            Some(name) if self.drones.contains_key(&name) => name,
            paired => {
                if let Some(id) = &request.paired_with {
                    warn!(pidfile = %id, drone = ?paired, "paired process is on no known drone");
                }
                self.choose_drone_for_execution(request.num_processes).to_string()
            }
        };
        let working_directory = self.absolute_path(&request.working_directory);
        let substitute = working_directory.display().to_string();
        let command: Vec<String> = request
            .command
            .into_iter()
            .map(|arg| arg.replace(WORKING_DIRECTORY, &substitute))
            .collect();
        let log_file = request.log_file.as_deref().map(|path| self.absolute_path(path));
        let id = PidfileId::new(working_directory.join(&request.pidfile_name));
        info!(%drone, pidfile = %id, processes = request.num_processes, "queueing command");
        if let Some(slot) = self.drones.get_mut(&drone) {
            slot.active_processes += request.num_processes;
            slot.queued.push(DroneCall::ExecuteCommand {
                command,
                working_directory,
                log_file,
                pidfile_name: request.pidfile_name,
            });
        }
        self.register(id.clone(), Some(drone), request.num_processes);
        id
    }

    pub fn kill_process(&mut self, process: &Process) {
        info!(%process, "killing process");
        self.queue_on(&process.drone, DroneCall::KillProcess { pid: process.pid });
    }

    /// Copy `source` (relative to the drone root) from the drone that ran
    /// `process` into the results repository, at `destination` or the same
    /// relative path.
    pub fn copy_to_results_repository(
        &mut self,
        process: &Process,
        source: &str,
        destination: Option<&str>,
    ) {
        let call = DroneCall::SendFileTo {
            target: self.results_drone.name().to_string(),
            source: self.absolute_path(source),
            destination: self.results_path(destination.unwrap_or(source)),
        };
        self.queue_on(&process.drone, call);
    }

    /// Copy `source` to `destination` on the drone that ran `process`, both
    /// relative to the drone root.
    pub fn copy_results_on_drone(&mut self, process: &Process, source: &str, destination: &str) {
        let call = DroneCall::CopyFileOrDirectory {
            source: self.absolute_path(source),
            destination: self.absolute_path(destination),
        };
        self.queue_on(&process.drone, call);
    }

    /// Append `lines` to `path`: on the drone of `paired_with` relative to the
    /// drone root, or in the results repository when unpaired.
    pub fn write_lines_to_file(&mut self, path: &str, lines: &[String], paired_with: Option<&Process>) {
        let mut contents = lines.join("\n");
        contents.push('\n');
        match paired_with {
            Some(process) => {
                let call = DroneCall::WriteToFile { path: self.absolute_path(path), contents };
                self.queue_on(&process.drone, call);
            }
            None => {
                let call = DroneCall::WriteToFile { path: self.results_path(path), contents };
                self.results_queue.push(call);
            }
        }
    }

    fn queue_on(&mut self, drone: &str, call: DroneCall) {
        if let Some(slot) = self.drones.get_mut(drone) {
            slot.queued.push(call);
        } else if drone == self.results_drone.name() {
            self.results_queue.push(call);
        } else {
            warn!(%drone, ?call, "dropping call for unknown drone");
        }
    }

    pub fn absolute_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.drone_root.join(path)
    }

    pub fn results_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.results_dir.join(path)
    }

    /// A fresh scratch directory, relative to the drone root.
    pub fn get_temporary_path(&mut self, base_name: &str) -> String {
        self.temporary_counter += 1;
        format!("{TEMPORARY_DIRECTORY}/{base_name}.{}", self.temporary_counter)
    }

    pub fn get_pidfile_id_from(&self, execution_tag: &str, pidfile_name: &str) -> PidfileId {
        PidfileId::new(self.absolute_path(execution_tag).join(pidfile_name))
    }

    /// Send every queued call to its drone.
    pub async fn execute_actions(&mut self) {
        for (name, slot) in self.drones.iter_mut() {
            if slot.queued.is_empty() {
                continue;
            }
            let calls = std::mem::take(&mut slot.queued);
            let count = calls.len();
            match slot.drone.execute_calls(calls).await {
                Ok(()) => debug!(drone = %name, count, "executed drone calls"),
                Err(e) => warn!(drone = %name, count, error = %e, "drone calls failed"),
            }
        }
        if !self.results_queue.is_empty() {
            let calls = std::mem::take(&mut self.results_queue);
            if let Err(e) = self.results_drone.execute_calls(calls).await {
                warn!(drone = %self.results_drone.name(), error = %e, "results drone calls failed");
            }
        }
    }
}

/// Fold one drone's pidfile reads into the cache. A pidfile owned by another
/// drone is ignored; an unowned one is claimed by the drone that has it.
fn absorb(
    cache: &mut ContentsCache,
    registered: &HashMap<PidfileId, Registration>,
    drone: &str,
    pidfiles: HashMap<PathBuf, Option<String>>,
) {
    for (path, text) in pidfiles {
        let id = PidfileId::new(path);
        let owner = registered.get(&id).and_then(|r| r.drone.as_deref());
        match (owner, text) {
            (Some(owner), _) if owner != drone => {}
            (None, None) => {
                cache.entry(id).or_insert_with(|| Ok(PidfileContents::default()));
            }
            (_, text) => {
                let parsed = PidfileContents::parse(drone, text.as_deref());
                if let Err(e) = &parsed {
                    warn!(%drone, pidfile = %id, error = %e, "unreadable pidfile");
                }
                cache.insert(id, parsed);
            }
        }
    }
}

#[cfg(test)]
#[path = "drone_manager_tests.rs"]
mod tests;
