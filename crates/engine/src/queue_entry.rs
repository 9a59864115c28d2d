// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue entry and job transitions driven by the scheduler: building the
//! task chain for a newly bound entry, gathering synchronous groups,
//! requeueing, failing and aborting.

use std::collections::BTreeSet;

use tb_core::{
    Clock, Host, HostQueueEntry, HostStatus, Job, JobId, Protection, QueueEntryId,
    QueueEntryStatus, RebootBefore,
};
use tb_storage::StoreExt;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::context::SchedulerContext;
use crate::error::DispatchError;
use crate::task::AgentTask;

/// Enough peers are Pending to start the payload.
pub(crate) fn is_ready<C: Clock>(ctx: &SchedulerContext<C>, job: &Job) -> bool {
    let pending = ctx
        .store
        .queue_entries(&|e| e.job_id == job.id && e.status == QueueEntryStatus::Pending)
        .len();
    pending >= job.synch_count as usize
}

/// Build the agent for an entry just bound to a host.
///
/// If the job still needs peers, the entry goes through the pre-job tasks
/// and waits in Pending; otherwise its group starts right away.
pub(crate) fn run<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    entry: &HostQueueEntry,
) -> Result<Agent, DispatchError> {
    let job = ctx.store.job(entry.job_id)?;
    if !is_ready(ctx, &job) {
        let host = ctx.store.entry_host(entry)?;
        let entry = ctx.store.set_entry_status(entry.id, QueueEntryStatus::Verifying)?;
        let tasks = pre_job_tasks(ctx, &job, &entry, &host);
        return Ok(Agent::new(tasks, 1));
    }
    let group = choose_group_to_run(ctx, &job, entry)?;
    finish_run(ctx, &job, &group)
}

/// Optional cleanup, optional verify, then wait for peers.
pub(crate) fn pre_job_tasks<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    job: &Job,
    entry: &HostQueueEntry,
    host: &Host,
) -> Vec<AgentTask> {
    let mut tasks = Vec::new();
    let reboot = match job.reboot_before {
        RebootBefore::Always => true,
        RebootBefore::IfDirty => host.dirty,
        RebootBefore::Never => false,
    };
    if reboot {
        tasks.push(AgentTask::cleanup(ctx, host, Some(entry)));
    }
    if job.run_verify && host.protection != Protection::DoNotVerify {
        tasks.push(AgentTask::verify(ctx, host, Some(entry)));
    }
    tasks.push(AgentTask::set_entry_pending(entry.id, host.id));
    tasks
}

/// `entry` plus enough Pending peers to fill the job's synch count, with a
/// shared execution subdirectory assigned.
fn choose_group_to_run<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    job: &Job,
    entry: &HostQueueEntry,
) -> Result<Vec<HostQueueEntry>, DispatchError> {
    let mut chosen = vec![entry.clone()];
    let needed = (job.synch_count as usize).saturating_sub(1);
    if needed > 0 {
        let peers = ctx.store.queue_entries(&|e| {
            e.job_id == job.id && e.status == QueueEntryStatus::Pending && e.id != entry.id
        });
        chosen.extend(peers.into_iter().take(needed));
    }
    let subdir = if chosen.len() == 1 {
        ctx.store.entry_host(entry)?.hostname
    } else {
        next_group_name(ctx, job.id)
    };
    let mut group = Vec::with_capacity(chosen.len());
    for member in chosen {
        let updated = ctx
            .store
            .update_queue_entry(member.id, &mut |e| e.execution_subdir = subdir.clone())?;
        group.push(updated);
    }
    Ok(group)
}

fn next_group_name<C: Clock>(ctx: &SchedulerContext<C>, job: JobId) -> String {
    let existing: BTreeSet<String> = ctx
        .store
        .job_entries(job)
        .into_iter()
        .map(|e| e.execution_subdir)
        .filter(|subdir| subdir.starts_with("group"))
        .collect();
    format!("group{}", existing.len())
}

/// Promote a group to Starting and build the agent that runs its payload.
fn finish_run<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    job: &Job,
    group: &[HostQueueEntry],
) -> Result<Agent, DispatchError> {
    for entry in group {
        ctx.store.set_entry_status(entry.id, QueueEntryStatus::Starting)?;
    }
    let task = AgentTask::queue(ctx, job, group)?;
    info!(job = %job.id, entries = group.len(), "starting job group");
    Ok(Agent::new(vec![task], group.len()))
}

/// The entry passed its pre-job tasks: mark it and its host Pending, then
/// start the group if every peer is waiting.
pub(crate) fn on_pending<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    entry: QueueEntryId,
) -> Result<(), DispatchError> {
    let current = ctx.store.queue_entry(entry)?;
    if current.complete || current.status.is_abort() {
        debug!(%entry, status = %current.status, "entry no longer waiting for peers");
        return Ok(());
    }
    let entry = ctx.store.set_entry_status(entry, QueueEntryStatus::Pending)?;
    if let Some(host) = entry.host_id {
        ctx.store.set_host_status(host, HostStatus::Pending)?;
    }
    let job = ctx.store.job(entry.job_id)?;
    if is_ready(ctx, &job) {
        let agent = run(ctx, &entry)?;
        ctx.add_agent(agent);
    } else {
        stop_if_necessary(ctx, job.id)?;
    }
    Ok(())
}

/// Put an entry back in the queue. A metahost entry also gives up its host.
pub(crate) fn requeue<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    entry: QueueEntryId,
) -> Result<(), DispatchError> {
    let entry = ctx.store.set_entry_status(entry, QueueEntryStatus::Queued)?;
    if entry.status == QueueEntryStatus::Queued && entry.is_metahost() {
        ctx.store.update_queue_entry(entry.id, &mut |e| e.host_id = None)?;
        ctx.store.recompute_blocks(entry.job_id)?;
    }
    Ok(())
}

/// The entry's host could not be repaired.
pub(crate) fn handle_host_failure<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    entry: QueueEntryId,
) -> Result<(), DispatchError> {
    let entry = ctx.store.set_entry_status(entry, QueueEntryStatus::Failed)?;
    stop_if_necessary(ctx, entry.job_id)
}

/// Fail every waiting entry of a job that can no longer gather enough
/// hosts to start.
pub(crate) fn stop_if_necessary<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    job: JobId,
) -> Result<(), DispatchError> {
    let synch_count = ctx.store.job(job)?.synch_count as usize;
    let waiting: Vec<HostQueueEntry> = ctx
        .store
        .job_entries(job)
        .into_iter()
        .filter(|e| {
            matches!(
                e.status,
                QueueEntryStatus::Queued | QueueEntryStatus::Verifying | QueueEntryStatus::Pending
            )
        })
        .collect();
    if waiting.len() >= synch_count {
        return Ok(());
    }
    info!(%job, waiting = waiting.len(), synch_count, "stopping job that cannot start");
    for entry in waiting {
        if entry.status == QueueEntryStatus::Pending {
            if let Some(host) = entry.host_id {
                ctx.store.set_host_status(host, HostStatus::Ready)?;
            }
        }
        ctx.store.set_entry_status(entry.id, QueueEntryStatus::Failed)?;
    }
    Ok(())
}

/// Cleanup then verify, for reclaiming a host whose work was aborted.
/// The host shows Cleaning immediately.
pub(crate) fn reverify_tasks<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    host: &Host,
) -> Result<Vec<AgentTask>, DispatchError> {
    let tasks = vec![AgentTask::cleanup(ctx, host, None), AgentTask::verify(ctx, host, None)];
    ctx.store.set_host_status(host.id, HostStatus::Cleaning)?;
    Ok(tasks)
}

/// Hand an entry marked Abort to an abort agent, after a host reclamation
/// agent when the entry holds its host.
pub(crate) fn abort_entry<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    entry: &HostQueueEntry,
    agents_to_abort: Vec<Agent>,
) -> Result<(), DispatchError> {
    if let (true, Some(host)) = (entry.active, entry.host_id) {
        let host = ctx.store.host(host)?;
        let tasks = reverify_tasks(ctx, &host)?;
        ctx.add_agent(Agent::new(tasks, 1));
    }
    ctx.store.set_entry_status(entry.id, QueueEntryStatus::Aborting)?;
    info!(entry = %entry.id, job = %entry.job_id, agents = agents_to_abort.len(), "aborting entry");
    ctx.add_agent(Agent::new(vec![AgentTask::abort_entry(entry.id, agents_to_abort)], 0));
    Ok(())
}

/// Abort every incomplete entry of a job: active ones are marked for the
/// abort sweep, the rest are aborted outright.
pub(crate) fn abort_job<C: Clock>(
    ctx: &mut SchedulerContext<C>,
    job: JobId,
) -> Result<(), DispatchError> {
    for entry in ctx.store.job_entries(job).into_iter().filter(|e| !e.complete) {
        let status =
            if entry.active { QueueEntryStatus::Abort } else { QueueEntryStatus::Aborted };
        ctx.store.set_entry_status(entry.id, status)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "queue_entry_tests.rs"]
mod tests;
