// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record operations shared by every `Store`.

use std::collections::BTreeSet;

use tb_core::{
    Host, HostId, HostQueueEntry, HostStatus, JobId, LabelId, QueueEntryId, QueueEntryStatus,
};
use tracing::{debug, info};

use crate::store::{Store, StoreError};

pub trait StoreExt: Store {
    /// Set an entry's status and the flags it implies. Abort statuses are
    /// never overwritten by non-abort ones.
    fn set_entry_status(
        &self,
        id: QueueEntryId,
        status: QueueEntryStatus,
    ) -> Result<HostQueueEntry, StoreError> {
        let mut applied = true;
        let entry = self.update_queue_entry(id, &mut |entry| applied = entry.apply_status(status))?;
        if applied {
            info!(entry = %id, job = %entry.job_id, %status, "queue entry status");
        } else {
            debug!(entry = %id, current = %entry.status, requested = %status, "kept abort status");
        }
        Ok(entry)
    }

    fn set_host_status(&self, id: HostId, status: HostStatus) -> Result<Host, StoreError> {
        let host = self.update_host(id, &mut |host| host.status = status)?;
        info!(host = %host.hostname, %status, "host status");
        Ok(host)
    }

    fn set_host_dirty(&self, id: HostId, dirty: bool) -> Result<Host, StoreError> {
        self.update_host(id, &mut |host| host.dirty = dirty)
    }

    /// The host an entry is bound to.
    fn entry_host(&self, entry: &HostQueueEntry) -> Result<Host, StoreError> {
        let id = entry.host_id.ok_or(StoreError::NoHost(entry.id))?;
        self.host(id)
    }

    fn job_entries(&self, job: JobId) -> Vec<HostQueueEntry> {
        self.queue_entries(&|e| e.job_id == job)
    }

    /// Hosts currently holding an active entry.
    fn hosts_with_active_entries(&self) -> BTreeSet<HostId> {
        self.queue_entries(&|e| e.active).into_iter().filter_map(|e| e.host_id).collect()
    }

    /// Hosts sharing at least one ACL group with `user`.
    fn acl_hosts_of_user(&self, user: &str) -> BTreeSet<HostId> {
        self.acl_groups(&|g| g.users.contains(user))
            .into_iter()
            .flat_map(|g| g.hosts.into_iter())
            .collect()
    }

    fn labels_of_host(&self, host: HostId) -> BTreeSet<LabelId> {
        self.labels(&|l| l.has_host(host)).into_iter().map(|l| l.id).collect()
    }

    /// Rebuild the ineligible-host rows of `job`: hosts already bound to the
    /// job plus hosts its owner cannot reach through an ACL group.
    fn recompute_blocks(&self, job: JobId) -> Result<(), StoreError> {
        let owner = self.job(job)?.owner;
        let accessible = self.acl_hosts_of_user(&owner);
        let mut blocked: BTreeSet<HostId> =
            self.job_entries(job).into_iter().filter_map(|e| e.host_id).collect();
        blocked.extend(self.hosts(&|h| !accessible.contains(&h.id)).into_iter().map(|h| h.id));
        debug!(%job, blocked = blocked.len(), "recomputed ineligible hosts");
        self.replace_blocks(job, &blocked);
        Ok(())
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
