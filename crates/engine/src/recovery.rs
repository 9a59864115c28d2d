// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rebuilding in-flight work from the store after a scheduler restart.

use std::collections::{BTreeMap, BTreeSet};

use tb_core::{Clock, HostQueueEntry, HostStatus, JobId, QueueEntryStatus};
use tb_storage::StoreExt;
use tracing::info;

use crate::agent::Agent;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::queue_entry;
use crate::task::AgentTask;

/// What [`Dispatcher::recover`] found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Execution groups whose payload is followed again.
    pub payloads: usize,
    /// Execution groups whose results are parsed again.
    pub parses: usize,
    pub aborts: usize,
    pub requeued: usize,
    pub reverified_hosts: usize,
}

/// Entries sharing a job and execution subdirectory.
fn group_by_execution(entries: Vec<HostQueueEntry>) -> BTreeMap<(JobId, String), Vec<HostQueueEntry>> {
    let mut groups: BTreeMap<(JobId, String), Vec<HostQueueEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry((entry.job_id, entry.execution_subdir.clone())).or_default().push(entry);
    }
    groups
}

impl<C: Clock> Dispatcher<C> {
    /// Pick up where a previous scheduler left off. Call once, before the
    /// first cycle.
    ///
    /// Payloads and parses reattach to their pidfiles. Aborts restart.
    /// Entries still waiting on pre-job work go back to the queue, and hosts
    /// left mid-task are verified again.
    pub fn recover(&mut self) -> Result<RecoverySummary, DispatchError> {
        let mut summary = RecoverySummary::default();
        let ctx = self.context_mut();

        for entry in ctx.store.queue_entries(&|e| e.status == QueueEntryStatus::Aborting) {
            queue_entry::abort_entry(ctx, &entry, Vec::new())?;
            summary.aborts += 1;
        }

        let running = ctx.store.queue_entries(&|e| {
            matches!(e.status, QueueEntryStatus::Running | QueueEntryStatus::Starting)
        });
        for ((job, subdir), group) in group_by_execution(running) {
            let launched = group.iter().any(|e| e.status == QueueEntryStatus::Running);
            if !launched || subdir.is_empty() {
                // Never launched: start over.
                for entry in &group {
                    queue_entry::requeue(ctx, entry.id)?;
                    summary.requeued += 1;
                }
                continue;
            }
            let job = ctx.store.job(job)?;
            let task = AgentTask::recovered_queue(ctx, &job, &group)?;
            ctx.add_agent(Agent::new(vec![task], group.len()));
            summary.payloads += 1;
        }

        let parsing = ctx.store.queue_entries(&|e| e.status == QueueEntryStatus::Parsing);
        for ((job, _), group) in group_by_execution(parsing) {
            let job = ctx.store.job(job)?;
            ctx.add_agent(Agent::new(vec![AgentTask::final_reparse(&job, &group)], 0));
            summary.parses += 1;
        }

        let waiting = ctx.store.queue_entries(&|e| {
            matches!(e.status, QueueEntryStatus::Verifying | QueueEntryStatus::Pending)
        });
        for entry in waiting {
            queue_entry::requeue(ctx, entry.id)?;
            summary.requeued += 1;
        }

        let busy = ctx.store.hosts_with_active_entries();
        let stranded = ctx.store.hosts(&|h| {
            (h.status.is_transient() || h.status == HostStatus::Running)
                && !busy.contains(&h.id)
        });
        for host in stranded {
            let task = AgentTask::verify(ctx, &host, None);
            ctx.add_agent(Agent::new(vec![task], 1));
            summary.reverified_hosts += 1;
        }

        let jobs: BTreeSet<JobId> =
            ctx.store.queue_entries(&|e| !e.complete).into_iter().map(|e| e.job_id).collect();
        for job in jobs {
            ctx.store.recompute_blocks(job)?;
        }

        self.adopt_new_agents();
        info!(?summary, "recovered scheduler state");
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
