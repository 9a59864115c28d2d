// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory tables of lab records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tb_core::{
    AclGroup, AclGroupId, Host, HostBlock, HostId, HostQueueEntry, Job, JobId, Label, LabelId,
    QueueEntryId,
};

/// Every table the scheduler reads, keyed by primary key.
///
/// Serialized as plain row lists so a front end can write the file without
/// knowing about the map layout.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LabSnapshot", into = "LabSnapshot")]
pub struct LabState {
    pub hosts: BTreeMap<HostId, Host>,
    pub labels: BTreeMap<LabelId, Label>,
    pub acl_groups: BTreeMap<AclGroupId, AclGroup>,
    pub jobs: BTreeMap<JobId, Job>,
    pub queue_entries: BTreeMap<QueueEntryId, HostQueueEntry>,
    pub blocks: BTreeSet<HostBlock>,
}

/// On-disk row lists.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LabSnapshot {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub acl_groups: Vec<AclGroup>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub queue_entries: Vec<HostQueueEntry>,
    #[serde(default)]
    pub ineligible_host_queues: Vec<HostBlock>,
}

impl From<LabSnapshot> for LabState {
    fn from(snapshot: LabSnapshot) -> Self {
        Self {
            hosts: snapshot.hosts.into_iter().map(|h| (h.id, h)).collect(),
            labels: snapshot.labels.into_iter().map(|l| (l.id, l)).collect(),
            acl_groups: snapshot.acl_groups.into_iter().map(|g| (g.id, g)).collect(),
            jobs: snapshot.jobs.into_iter().map(|j| (j.id, j)).collect(),
            queue_entries: snapshot.queue_entries.into_iter().map(|e| (e.id, e)).collect(),
            blocks: snapshot.ineligible_host_queues.into_iter().collect(),
        }
    }
}

impl From<LabState> for LabSnapshot {
    fn from(state: LabState) -> Self {
        Self {
            hosts: state.hosts.into_values().collect(),
            labels: state.labels.into_values().collect(),
            acl_groups: state.acl_groups.into_values().collect(),
            jobs: state.jobs.into_values().collect(),
            queue_entries: state.queue_entries.into_values().collect(),
            ineligible_host_queues: state.blocks.into_iter().collect(),
        }
    }
}

impl LabState {
    pub fn insert_host(&mut self, host: Host) {
        self.hosts.insert(host.id, host);
    }

    pub fn insert_label(&mut self, label: Label) {
        self.labels.insert(label.id, label);
    }

    pub fn insert_acl_group(&mut self, group: AclGroup) {
        self.acl_groups.insert(group.id, group);
    }

    pub fn insert_job(&mut self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn insert_queue_entry(&mut self, entry: HostQueueEntry) {
        self.queue_entries.insert(entry.id, entry);
    }

    /// Hosts holding more than one active entry. Always empty in a
    /// consistent store.
    pub fn double_booked_hosts(&self) -> Vec<HostId> {
        let mut seen = BTreeSet::new();
        let mut doubled = Vec::new();
        for entry in self.queue_entries.values().filter(|e| e.active) {
            if let Some(host) = entry.host_id {
                if !seen.insert(host) && !doubled.contains(&host) {
                    doubled.push(host);
                }
            }
        }
        doubled
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
