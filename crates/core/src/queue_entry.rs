// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host queue entries bind a job to a host (or a metahost label) and carry
//! the per-host execution status.

use serde::{Deserialize, Serialize};

use crate::id::{HostId, JobId, LabelId, QueueEntryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QueueEntryStatus {
    #[default]
    Queued,
    Verifying,
    Pending,
    Starting,
    Running,
    Parsing,
    Completed,
    Failed,
    /// Abort requested by the front end; not yet picked up.
    Abort,
    Aborting,
    Aborted,
}

crate::simple_display! {
    QueueEntryStatus {
        Queued => "Queued",
        Verifying => "Verifying",
        Pending => "Pending",
        Starting => "Starting",
        Running => "Running",
        Parsing => "Parsing",
        Completed => "Completed",
        Failed => "Failed",
        Abort => "Abort",
        Aborting => "Aborting",
        Aborted => "Aborted",
    }
}

impl QueueEntryStatus {
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort | Self::Aborting | Self::Aborted)
    }

    /// `(active, complete)` implied by the status, if it implies them.
    ///
    /// `Abort` leaves both flags alone: an entry keeps its slot on the host
    /// until the abort is processed.
    pub fn flags(&self) -> Option<(bool, bool)> {
        match self {
            Self::Queued | Self::Parsing => Some((false, false)),
            Self::Pending | Self::Running | Self::Verifying | Self::Starting | Self::Aborting => {
                Some((true, false))
            }
            Self::Failed | Self::Completed | Self::Aborted => Some((false, true)),
            Self::Abort => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostQueueEntry {
    pub id: QueueEntryId,
    pub job_id: JobId,
    /// Concrete host; set at submission, or when a metahost entry is scheduled.
    #[serde(default)]
    pub host_id: Option<HostId>,
    /// Label the entry was submitted against, for metahost entries.
    #[serde(default)]
    pub meta_host: Option<LabelId>,
    #[serde(default)]
    pub status: QueueEntryStatus,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub complete: bool,
    /// Results subdirectory of the execution group; empty until assigned.
    #[serde(default)]
    pub execution_subdir: String,
}

impl HostQueueEntry {
    pub fn is_metahost(&self) -> bool {
        self.meta_host.is_some()
    }

    /// Queued, inactive and incomplete: ready for the host scheduler.
    pub fn is_schedulable(&self) -> bool {
        self.status == QueueEntryStatus::Queued && !self.active && !self.complete
    }

    /// Set the status and the flags it implies.
    ///
    /// Returns false, leaving the entry untouched, when the entry is already
    /// in an abort status and `status` is not one.
    pub fn apply_status(&mut self, status: QueueEntryStatus) -> bool {
        if self.status.is_abort() && !status.is_abort() {
            return false;
        }
        self.status = status;
        if let Some((active, complete)) = status.flags() {
            self.active = active;
            self.complete = complete;
        }
        true
    }
}

/// One IneligibleHostQueue row: metahost entries of `job_id` may not pick `host_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostBlock {
    pub job_id: JobId,
    pub host_id: HostId,
}

crate::builder! {
    pub struct HostQueueEntryBuilder => HostQueueEntry {
        into {
            execution_subdir: String = "",
        }
        set {
            id: QueueEntryId = QueueEntryId::new(1),
            job_id: JobId = JobId::new(1),
            host_id: Option<HostId> = None,
            meta_host: Option<LabelId> = None,
            status: QueueEntryStatus = QueueEntryStatus::Queued,
            active: bool = false,
            complete: bool = false,
        }
    }
}

#[cfg(test)]
#[path = "queue_entry_tests.rs"]
mod tests;
