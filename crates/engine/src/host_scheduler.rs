// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host matching for one scheduling pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tb_core::{Host, HostId, HostQueueEntry, Job, JobId, Label, LabelId};
use tb_storage::{Store, StoreExt};
use tracing::trace;

/// Snapshot of hosts, labels, ACLs and block rows taken at the start of a
/// pass. A host handed out is no longer available for the rest of the pass.
#[derive(Debug)]
pub struct HostScheduler {
    hosts: BTreeMap<HostId, Host>,
    /// Ready, unlocked and free of active entries.
    available: BTreeSet<HostId>,
    labels: BTreeMap<LabelId, Label>,
    labels_by_host: BTreeMap<HostId, BTreeSet<LabelId>>,
    blocks: BTreeSet<(JobId, HostId)>,
    acl_hosts_by_user: HashMap<String, BTreeSet<HostId>>,
}

impl HostScheduler {
    pub fn new(store: &dyn Store) -> Self {
        let busy = store.hosts_with_active_entries();
        let hosts: BTreeMap<HostId, Host> =
            store.hosts(&|_| true).into_iter().map(|h| (h.id, h)).collect();
        let available = hosts
            .values()
            .filter(|h| h.is_available() && !busy.contains(&h.id))
            .map(|h| h.id)
            .collect();
        let labels: BTreeMap<LabelId, Label> =
            store.labels(&|_| true).into_iter().map(|l| (l.id, l)).collect();
        let mut labels_by_host: BTreeMap<HostId, BTreeSet<LabelId>> = BTreeMap::new();
        for label in labels.values() {
            for host in &label.hosts {
                labels_by_host.entry(*host).or_default().insert(label.id);
            }
        }
        let blocks = store.blocks(&|_| true).into_iter().map(|b| (b.job_id, b.host_id)).collect();
        let mut acl_hosts_by_user: HashMap<String, BTreeSet<HostId>> = HashMap::new();
        for group in store.acl_groups(&|_| true) {
            for user in &group.users {
                acl_hosts_by_user.entry(user.clone()).or_default().extend(group.hosts.iter().copied());
            }
        }
        Self { hosts, available, labels, labels_by_host, blocks, acl_hosts_by_user }
    }

    pub fn is_available(&self, host: HostId) -> bool {
        self.available.contains(&host)
    }

    /// Pick a host for `entry` and take it out of the pool.
    pub fn find_eligible_host(&mut self, entry: &HostQueueEntry, job: &Job) -> Option<Host> {
        let chosen = match (entry.host_id, entry.meta_host) {
            (Some(host), _) => self.schedule_non_metahost(host, job),
            (None, Some(label)) => self.schedule_metahost(label, job),
            (None, None) => None,
        }?;
        self.available.remove(&chosen);
        self.hosts.get(&chosen).cloned()
    }

    fn schedule_non_metahost(&self, host: HostId, job: &Job) -> Option<HostId> {
        if !self.is_available(host) || !self.is_host_eligible_for_job(host, job, None) {
            return None;
        }
        Some(host)
    }

    fn schedule_metahost(&self, label: LabelId, job: &Job) -> Option<HostId> {
        let label = self.labels.get(&label)?;
        label.hosts.iter().copied().find(|&host| {
            let invalid = self.hosts.get(&host).map_or(true, |h| h.invalid);
            if invalid || !self.is_available(host) {
                return false;
            }
            if self.blocks.contains(&(job.id, host)) {
                trace!(job = %job.id, %host, "host blocked for job");
                return false;
            }
            self.is_host_eligible_for_job(host, job, Some(label.id))
        })
    }

    /// ACL access and dependency labels. Only-if-needed labels keep
    /// metahost matching away from a host; naming the host is enough to
    /// get it.
    fn is_host_eligible_for_job(&self, host: HostId, job: &Job, metahost: Option<LabelId>) -> bool {
        let acl_ok =
            self.acl_hosts_by_user.get(&job.owner).is_some_and(|hosts| hosts.contains(&host));
        if !acl_ok {
            return false;
        }
        let empty = BTreeSet::new();
        let host_labels = self.labels_by_host.get(&host).unwrap_or(&empty);
        if !job.dependency_labels.is_subset(host_labels) {
            return false;
        }
        let Some(metahost) = metahost else {
            return true;
        };
        host_labels.iter().all(|label| {
            let only_if_needed = self.labels.get(label).is_some_and(|l| l.only_if_needed);
            !only_if_needed || *label == metahost || job.depends_on(*label)
        })
    }
}

#[cfg(test)]
#[path = "host_scheduler_tests.rs"]
mod tests;
