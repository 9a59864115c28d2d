// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job payload: one test-runner process spanning an execution group.

use tb_core::{
    Clock, ControlType, HostId, HostQueueEntry, HostStatus, Job, QueueEntryId, QueueEntryStatus,
    RebootAfter, AUTOSERV_PIDFILE,
};
use tb_storage::StoreExt;
use tracing::{info, warn};

use super::{AgentTask, TaskCore};
use crate::agent::Agent;
use crate::context::SchedulerContext;
use crate::drone_manager::{LaunchRequest, WORKING_DIRECTORY};
use crate::error::DispatchError;

#[derive(Debug)]
pub struct QueueTask {
    pub(super) core: TaskCore,
    job: Job,
    execution_tag: String,
    command: Vec<String>,
    /// Attach to a payload launched before a scheduler restart.
    recover: bool,
}

impl QueueTask {
    fn new<C: Clock>(
        ctx: &SchedulerContext<C>,
        job: &Job,
        group: &[HostQueueEntry],
        recover: bool,
    ) -> Result<Self, DispatchError> {
        let first = group.first().ok_or(DispatchError::EmptyGroup(job.id))?;
        if first.execution_subdir.is_empty() {
            return Err(DispatchError::NoExecutionGroup { job: job.id, entry: first.id });
        }
        let execution_tag = job.execution_tag(&first.execution_subdir);
        let mut hostnames = Vec::with_capacity(group.len());
        let mut host_ids = Vec::with_capacity(group.len());
        for entry in group {
            let host = ctx.store.entry_host(entry)?;
            hostnames.push(host.hostname);
            host_ids.push(host.id);
        }
        let mut command = vec![
            ctx.config.autoserv_path.clone(),
            "-P".to_string(),
            execution_tag.clone(),
            "-n".to_string(),
            "-r".to_string(),
            WORKING_DIRECTORY.to_string(),
            "-u".to_string(),
            job.owner.clone(),
            "-l".to_string(),
            job.name.clone(),
            "-m".to_string(),
            hostnames.join(","),
        ];
        if job.control_type == ControlType::Client {
            command.push("-c".to_string());
        }
        command.push(job.control_file.clone());
        let entry_ids = group.iter().map(|e| e.id).collect();
        Ok(Self {
            core: TaskCore::new(entry_ids, host_ids),
            job: job.clone(),
            execution_tag,
            command,
            recover,
        })
    }

    pub fn execution_tag(&self) -> &str {
        &self.execution_tag
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    fn entries(&self) -> Vec<QueueEntryId> {
        self.core.queue_entry_ids.clone()
    }

    fn hosts(&self) -> Vec<HostId> {
        self.core.host_ids.clone()
    }

    pub(super) fn start<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        for entry in self.entries() {
            ctx.store.set_entry_status(entry, QueueEntryStatus::Running)?;
        }
        for host in self.hosts() {
            ctx.store.set_host_status(host, HostStatus::Running)?;
            ctx.store.set_host_dirty(host, true)?;
        }
        let num_processes = self.core.queue_entry_ids.len();
        if self.recover {
            info!(tag = %self.execution_tag, "recovering payload");
            let tag = self.execution_tag.clone();
            self.core.attach(ctx, &tag, AUTOSERV_PIDFILE, num_processes);
            return Ok(());
        }
        let queued = self.job.created_on_ms / 1000;
        self.write_keyval(ctx, "job_queued", queued, false);
        let request = LaunchRequest {
            command: self.command.clone(),
            working_directory: self.execution_tag.clone(),
            pidfile_name: AUTOSERV_PIDFILE.to_string(),
            log_file: None,
            num_processes,
            paired_with: None,
        };
        self.core.launch(ctx, request);
        Ok(())
    }

    /// Append `key=value` to the group's keyval file, on the payload's drone
    /// when `paired`, else in the results repository.
    fn write_keyval<C: Clock>(&self, ctx: &mut SchedulerContext<C>, key: &str, value: u64, paired: bool) {
        let path = format!("{}/keyval", self.execution_tag);
        let line = format!("{key}={value}");
        let process = self.core.monitor().and_then(|m| m.process()).cloned();
        match (paired, process) {
            (true, Some(process)) => ctx.drones.write_lines_to_file(&path, &[line], Some(&process)),
            (true, None) => warn!(tag = %self.execution_tag, %key, "no process to pair keyval with"),
            (false, _) => ctx.drones.write_lines_to_file(&path, &[line], None),
        }
    }

    pub(super) fn epilog<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        let finished = ctx.clock.epoch_ms() / 1000;
        self.write_keyval(ctx, "job_finished", finished, true);
        for entry in self.entries() {
            ctx.store.set_entry_status(entry, QueueEntryStatus::Parsing)?;
        }
        let group: Vec<HostQueueEntry> = self
            .entries()
            .into_iter()
            .map(|id| ctx.store.queue_entry(id))
            .collect::<Result<_, _>>()?;
        ctx.add_agent(Agent::new(vec![AgentTask::final_reparse(&self.job, &group)], 0));

        let passed = self.core.success == Some(true)
            && self.core.monitor().and_then(|m| m.num_tests_failed()) == Some(0);
        let reboot = match self.job.reboot_after {
            RebootAfter::Always => true,
            RebootAfter::IfAllTestsPassed => passed,
            RebootAfter::Never => false,
        };
        for host in self.hosts() {
            if reboot {
                let host = ctx.store.host(host)?;
                let task = AgentTask::cleanup(ctx, &host, None);
                ctx.add_agent(Agent::new(vec![task], 1));
            } else {
                ctx.store.set_host_status(host, HostStatus::Ready)?;
            }
        }
        info!(job = %self.job.id, tag = %self.execution_tag, passed, "payload finished");
        Ok(())
    }

    pub(super) fn on_abort<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) {
        let aborted = ctx.clock.epoch_ms() / 1000;
        self.write_keyval(ctx, "job_aborted", aborted, true);
    }
}

impl AgentTask {
    /// Payload for an execution group already assigned its subdirectory.
    pub fn queue<C: Clock>(
        ctx: &SchedulerContext<C>,
        job: &Job,
        group: &[HostQueueEntry],
    ) -> Result<Self, DispatchError> {
        Ok(Self::Queue(QueueTask::new(ctx, job, group, false)?))
    }

    /// Payload that reattaches to a process started before a restart.
    pub fn recovered_queue<C: Clock>(
        ctx: &SchedulerContext<C>,
        job: &Job,
        group: &[HostQueueEntry],
    ) -> Result<Self, DispatchError> {
        Ok(Self::Queue(QueueTask::new(ctx, job, group, true)?))
    }

    pub fn as_queue_task(&self) -> Option<&QueueTask> {
        match self {
            Self::Queue(task) => Some(task),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
