// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verify, repair and cleanup: test-runner invocations against one host.

use std::path::Path;

use tb_core::{
    Clock, Host, HostId, HostQueueEntry, HostStatus, QueueEntryId, QueueEntryStatus, AUTOSERV_PIDFILE,
};
use tb_storage::StoreExt;
use tracing::info;

use super::{AgentTask, TaskCore};
use crate::context::SchedulerContext;
use crate::drone_manager::LaunchRequest;
use crate::error::DispatchError;
use crate::queue_entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTaskKind {
    Verify,
    Repair,
    Cleanup,
}

impl HostTaskKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Repair => "repair",
            Self::Cleanup => "cleanup",
        }
    }
}

#[derive(Debug)]
pub struct HostTask {
    pub(super) core: TaskCore,
    kind: HostTaskKind,
    host_id: HostId,
    hostname: String,
    queue_entry: Option<QueueEntryId>,
    /// Whether `queue_entry` is a metahost entry.
    metahost: bool,
    command: Vec<String>,
    temp_dir: String,
    log_file: String,
}

impl HostTask {
    fn new<C: Clock>(
        ctx: &mut SchedulerContext<C>,
        kind: HostTaskKind,
        host: &Host,
        entry: Option<&HostQueueEntry>,
    ) -> Self {
        let temp_dir = ctx.drones.get_temporary_path(kind.name());
        let mut command = vec![ctx.config.autoserv_path.clone(), "-p".to_string()];
        match kind {
            HostTaskKind::Verify => command.push("-v".to_string()),
            HostTaskKind::Repair => command.push("-R".to_string()),
            HostTaskKind::Cleanup => command.push("--cleanup".to_string()),
        }
        command.extend([
            "-m".to_string(),
            host.hostname.clone(),
            "-r".to_string(),
            ctx.drones.absolute_path(&temp_dir).display().to_string(),
        ]);
        if kind == HostTaskKind::Repair {
            command.extend(["--host-protection".to_string(), host.protection.to_string()]);
        }
        let log_file = format!(
            "hosts/{}/{}.{}",
            host.hostname,
            ctx.clock.epoch_ms() / 1000,
            kind.name()
        );
        let entry_ids = entry.map(|e| vec![e.id]).unwrap_or_default();
        let mut core = TaskCore::new(entry_ids, vec![host.id]);
        if kind != HostTaskKind::Repair {
            core.failure_tasks = vec![AgentTask::repair(ctx, host, entry)];
        }
        Self {
            core,
            kind,
            host_id: host.id,
            hostname: host.hostname.clone(),
            queue_entry: entry.map(|e| e.id),
            metahost: entry.is_some_and(HostQueueEntry::is_metahost),
            command,
            temp_dir,
            log_file,
        }
    }

    pub fn kind(&self) -> HostTaskKind {
        self.kind
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn queue_entry(&self) -> Option<QueueEntryId> {
        self.queue_entry
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub(super) fn start<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        match self.kind {
            HostTaskKind::Verify => {
                if let Some(entry) = self.queue_entry {
                    ctx.store.set_entry_status(entry, QueueEntryStatus::Verifying)?;
                }
                ctx.store.set_host_status(self.host_id, HostStatus::Verifying)?;
            }
            HostTaskKind::Repair => {
                if let Some(entry) = self.queue_entry {
                    queue_entry::requeue(ctx, entry)?;
                }
                ctx.store.set_host_status(self.host_id, HostStatus::Repairing)?;
            }
            HostTaskKind::Cleanup => {
                ctx.store.set_host_status(self.host_id, HostStatus::Cleaning)?;
            }
        }
        let request = LaunchRequest {
            command: self.command.clone(),
            working_directory: self.temp_dir.clone(),
            pidfile_name: AUTOSERV_PIDFILE.to_string(),
            log_file: Some(self.log_file.clone()),
            num_processes: 1,
            paired_with: None,
        };
        self.core.launch(ctx, request);
        Ok(())
    }

    pub(super) fn epilog<C: Clock>(
        &mut self,
        ctx: &mut SchedulerContext<C>,
        success: bool,
    ) -> Result<(), DispatchError> {
        info!(task = self.kind.name(), host = %self.hostname, success, "host task finished");
        match (self.kind, success) {
            (HostTaskKind::Repair, true) | (HostTaskKind::Verify, true) => {
                ctx.store.set_host_status(self.host_id, HostStatus::Ready)?;
            }
            (HostTaskKind::Cleanup, true) => {
                ctx.store.set_host_status(self.host_id, HostStatus::Ready)?;
                ctx.store.set_host_dirty(self.host_id, false)?;
            }
            (HostTaskKind::Repair, false) => {
                ctx.store.set_host_status(self.host_id, HostStatus::RepairFailed)?;
                ctx.email.enqueue_notify_email(
                    &format!("Repair failed on {}", self.hostname),
                    &format!("Host {} could not be repaired and is out of service.", self.hostname),
                );
                if let (Some(entry), false) = (self.queue_entry, self.metahost) {
                    queue_entry::handle_host_failure(ctx, entry)?;
                }
            }
            (HostTaskKind::Verify, false) | (HostTaskKind::Cleanup, false) => {
                if let (Some(entry), false) = (self.queue_entry, self.metahost) {
                    self.copy_log_to_entry_results(ctx, entry)?;
                }
            }
        }
        Ok(())
    }

    /// Put a failed pre-job log where the entry's results would have gone.
    fn copy_log_to_entry_results<C: Clock>(
        &self,
        ctx: &mut SchedulerContext<C>,
        entry: QueueEntryId,
    ) -> Result<(), DispatchError> {
        let Some(process) = self.core.monitor().and_then(|m| m.process()).cloned() else {
            return Ok(());
        };
        let entry = ctx.store.update_queue_entry(entry, &mut |e| {
            e.execution_subdir = self.hostname.clone();
        })?;
        let job = ctx.store.job(entry.job_id)?;
        let basename = Path::new(&self.log_file)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let destination = format!("{}/{basename}", job.execution_tag(&entry.execution_subdir));
        ctx.drones.copy_to_results_repository(&process, &self.log_file, Some(&destination));
        Ok(())
    }
}

impl AgentTask {
    pub fn verify<C: Clock>(
        ctx: &mut SchedulerContext<C>,
        host: &Host,
        entry: Option<&HostQueueEntry>,
    ) -> Self {
        Self::Host(HostTask::new(ctx, HostTaskKind::Verify, host, entry))
    }

    pub fn repair<C: Clock>(
        ctx: &mut SchedulerContext<C>,
        host: &Host,
        entry: Option<&HostQueueEntry>,
    ) -> Self {
        Self::Host(HostTask::new(ctx, HostTaskKind::Repair, host, entry))
    }

    pub fn cleanup<C: Clock>(
        ctx: &mut SchedulerContext<C>,
        host: &Host,
        entry: Option<&HostQueueEntry>,
    ) -> Self {
        Self::Host(HostTask::new(ctx, HostTaskKind::Cleanup, host, entry))
    }

    pub fn as_host_task(&self) -> Option<&HostTask> {
        match self {
            Self::Host(task) => Some(task),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
