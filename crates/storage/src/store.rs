// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler's view of the lab database: filter-and-update over records.

use std::collections::BTreeSet;

use tb_core::{
    AclGroup, Host, HostBlock, HostId, HostQueueEntry, Job, JobId, Label, QueueEntryId,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("host {0} not found")]
    HostNotFound(HostId),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("queue entry {0} not found")]
    QueueEntryNotFound(QueueEntryId),
    #[error("queue entry {0} has no host")]
    NoHost(QueueEntryId),
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Record access used by the dispatcher.
///
/// `filter` methods return clones ordered by id. `update` methods apply the
/// closure under the store's lock and return the updated row. Labels, ACL
/// groups and jobs are written by the front end only, so they are read-only
/// here.
pub trait Store: Send + Sync {
    fn hosts(&self, filter: &dyn Fn(&Host) -> bool) -> Vec<Host>;
    fn host(&self, id: HostId) -> Result<Host, StoreError>;
    fn update_host(&self, id: HostId, f: &mut dyn FnMut(&mut Host)) -> Result<Host, StoreError>;

    fn labels(&self, filter: &dyn Fn(&Label) -> bool) -> Vec<Label>;
    fn acl_groups(&self, filter: &dyn Fn(&AclGroup) -> bool) -> Vec<AclGroup>;

    fn jobs(&self, filter: &dyn Fn(&Job) -> bool) -> Vec<Job>;
    fn job(&self, id: JobId) -> Result<Job, StoreError>;

    fn queue_entries(&self, filter: &dyn Fn(&HostQueueEntry) -> bool) -> Vec<HostQueueEntry>;
    fn queue_entry(&self, id: QueueEntryId) -> Result<HostQueueEntry, StoreError>;
    fn update_queue_entry(
        &self,
        id: QueueEntryId,
        f: &mut dyn FnMut(&mut HostQueueEntry),
    ) -> Result<HostQueueEntry, StoreError>;

    fn blocks(&self, filter: &dyn Fn(&HostBlock) -> bool) -> Vec<HostBlock>;
    /// Replace every block row of `job` with one row per host in `hosts`.
    fn replace_blocks(&self, job: JobId, hosts: &BTreeSet<HostId>);
}
