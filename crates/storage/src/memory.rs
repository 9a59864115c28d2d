// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store backed by in-memory tables, persisted as a JSON snapshot.

use std::collections::BTreeSet;
use std::path::Path;

use parking_lot::Mutex;
use tb_core::{
    AclGroup, Host, HostBlock, HostId, HostQueueEntry, Job, JobId, Label, QueueEntryId,
};
use tracing::info;

use crate::state::LabState;
use crate::store::{Store, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<LabState>,
}

impl MemoryStore {
    pub fn new(state: LabState) -> Self {
        Self { state: Mutex::new(state) }
    }

    /// Load a snapshot file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            info!(path = %path.display(), "no lab snapshot, starting empty");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let state: LabState = serde_json::from_str(&text)?;
        info!(
            path = %path.display(),
            hosts = state.hosts.len(),
            jobs = state.jobs.len(),
            queue_entries = state.queue_entries.len(),
            "loaded lab snapshot"
        );
        Ok(Self::new(state))
    }

    /// Write the snapshot next to `path` and rename it into place.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&*self.state.lock())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Copy of every table.
    pub fn snapshot(&self) -> LabState {
        self.state.lock().clone()
    }

    /// Mutate the tables directly, the way the front end would.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut LabState) -> R) -> R {
        f(&mut self.state.lock())
    }
}

fn filtered<T: Clone>(rows: impl Iterator<Item = T>, filter: &dyn Fn(&T) -> bool) -> Vec<T> {
    rows.filter(|row| filter(row)).collect()
}

impl Store for MemoryStore {
    fn hosts(&self, filter: &dyn Fn(&Host) -> bool) -> Vec<Host> {
        filtered(self.state.lock().hosts.values().cloned(), filter)
    }

    fn host(&self, id: HostId) -> Result<Host, StoreError> {
        self.state.lock().hosts.get(&id).cloned().ok_or(StoreError::HostNotFound(id))
    }

    fn update_host(&self, id: HostId, f: &mut dyn FnMut(&mut Host)) -> Result<Host, StoreError> {
        let mut state = self.state.lock();
        let host = state.hosts.get_mut(&id).ok_or(StoreError::HostNotFound(id))?;
        f(host);
        Ok(host.clone())
    }

    fn labels(&self, filter: &dyn Fn(&Label) -> bool) -> Vec<Label> {
        filtered(self.state.lock().labels.values().cloned(), filter)
    }

    fn acl_groups(&self, filter: &dyn Fn(&AclGroup) -> bool) -> Vec<AclGroup> {
        filtered(self.state.lock().acl_groups.values().cloned(), filter)
    }

    fn jobs(&self, filter: &dyn Fn(&Job) -> bool) -> Vec<Job> {
        filtered(self.state.lock().jobs.values().cloned(), filter)
    }

    fn job(&self, id: JobId) -> Result<Job, StoreError> {
        self.state.lock().jobs.get(&id).cloned().ok_or(StoreError::JobNotFound(id))
    }

    fn queue_entries(&self, filter: &dyn Fn(&HostQueueEntry) -> bool) -> Vec<HostQueueEntry> {
        filtered(self.state.lock().queue_entries.values().cloned(), filter)
    }

    fn queue_entry(&self, id: QueueEntryId) -> Result<HostQueueEntry, StoreError> {
        self.state
            .lock()
            .queue_entries
            .get(&id)
            .cloned()
            .ok_or(StoreError::QueueEntryNotFound(id))
    }

    fn update_queue_entry(
        &self,
        id: QueueEntryId,
        f: &mut dyn FnMut(&mut HostQueueEntry),
    ) -> Result<HostQueueEntry, StoreError> {
        let mut state = self.state.lock();
        let entry = state.queue_entries.get_mut(&id).ok_or(StoreError::QueueEntryNotFound(id))?;
        f(entry);
        Ok(entry.clone())
    }

    fn blocks(&self, filter: &dyn Fn(&HostBlock) -> bool) -> Vec<HostBlock> {
        filtered(self.state.lock().blocks.iter().copied(), filter)
    }

    fn replace_blocks(&self, job: JobId, hosts: &BTreeSet<HostId>) {
        let mut state = self.state.lock();
        state.blocks.retain(|block| block.job_id != job);
        state.blocks.extend(hosts.iter().map(|&host_id| HostBlock { job_id: job, host_id }));
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
