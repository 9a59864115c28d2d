// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Results parsing after a payload exits, and the entries' final status.

use tb_core::{
    Clock, HostQueueEntry, Job, JobId, QueueEntryId, QueueEntryStatus, AUTOSERV_PIDFILE,
    PARSER_PIDFILE,
};
use tb_storage::StoreExt;
use tracing::{debug, info};

use super::{AgentTask, TaskCore};
use crate::context::SchedulerContext;
use crate::drone_manager::LaunchRequest;
use crate::error::DispatchError;
use crate::monitor::PidfileRunMonitor;

#[derive(Debug)]
pub struct FinalReparseTask {
    pub(super) core: TaskCore,
    job_id: JobId,
    execution_tag: String,
    /// Follows the finished payload; the parser runs under `core`.
    payload: PidfileRunMonitor,
    parse_started: bool,
}

impl FinalReparseTask {
    pub fn execution_tag(&self) -> &str {
        &self.execution_tag
    }

    pub fn parse_started(&self) -> bool {
        self.parse_started
    }

    fn entries(&self) -> Vec<QueueEntryId> {
        self.core.queue_entry_ids.clone()
    }

    pub(super) fn start<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        for entry in self.entries() {
            ctx.store.set_entry_status(entry, QueueEntryStatus::Parsing)?;
        }
        self.payload.attach_to_existing_process(ctx, &self.execution_tag, AUTOSERV_PIDFILE, 0);
        Ok(())
    }

    /// Start the parser once the payload's pidfile has been read and a parse
    /// slot is free. True once it has started.
    pub(super) fn try_start_parse<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> bool {
        if self.parse_started {
            return true;
        }
        let tag = self.execution_tag.clone();
        // The parser runs where the results are, so the payload's drone must
        // be known first.
        if self.payload.exit_code(ctx).is_none() || !self.payload.has_process() {
            debug!(%tag, "waiting for the payload pidfile");
            return false;
        }
        if !ctx.can_run_new_parse() {
            debug!(%tag, running = ctx.running_parses(), "waiting for a parse slot");
            return false;
        }
        let command = vec![
            ctx.config.parser_path.clone(),
            "--write-pidfile".to_string(),
            "-l".to_string(),
            "2".to_string(),
            "-r".to_string(),
            "-o".to_string(),
            ctx.drones.absolute_path(&tag).display().to_string(),
        ];
        let request = LaunchRequest {
            command,
            working_directory: tag.clone(),
            pidfile_name: PARSER_PIDFILE.to_string(),
            log_file: Some(format!("{tag}/.parse.log")),
            num_processes: 0,
            paired_with: self.payload.pidfile_id().cloned(),
        };
        self.core.launch(ctx, request);
        ctx.parse_started();
        self.parse_started = true;
        true
    }

    pub(super) fn epilog<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        if self.parse_started {
            ctx.parse_finished();
        }
        let payload_exit = self.payload.exit_code(ctx);
        let process = match self.payload.process() {
            Some(process) => process.clone(),
            None => ctx.drones.dummy_process(),
        };
        ctx.drones.copy_to_results_repository(&process, &self.execution_tag, None);
        // The parser's own exit status counts too: results that were never
        // parsed do not make a completed entry.
        let parsed = self.core.success == Some(true);
        let status = if payload_exit == Some(0) && parsed {
            QueueEntryStatus::Completed
        } else {
            QueueEntryStatus::Failed
        };
        for entry in self.entries() {
            ctx.store.set_entry_status(entry, status)?;
        }
        info!(job = %self.job_id, tag = %self.execution_tag, ?payload_exit, parsed, %status, "results parsed");
        self.payload.release(ctx);
        self.core.success = Some(true);
        Ok(())
    }

    pub(super) fn on_abort<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) {
        if self.parse_started {
            ctx.parse_finished();
        }
        self.payload.release(ctx);
    }
}

impl AgentTask {
    /// Parse for an execution group whose payload has exited.
    pub fn final_reparse(job: &Job, group: &[HostQueueEntry]) -> Self {
        let subdir = group.first().map(|e| e.execution_subdir.as_str()).unwrap_or_default();
        let host_ids = group.iter().filter_map(|e| e.host_id).collect();
        Self::FinalReparse(FinalReparseTask {
            core: TaskCore::new(group.iter().map(|e| e.id).collect(), host_ids),
            job_id: job.id,
            execution_tag: job.execution_tag(subdir),
            payload: PidfileRunMonitor::new(),
            parse_started: false,
        })
    }

    pub fn as_final_reparse(&self) -> Option<&FinalReparseTask> {
        match self {
            Self::FinalReparse(task) => Some(task),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "reparse_tests.rs"]
mod tests;
