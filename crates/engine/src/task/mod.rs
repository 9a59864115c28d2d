// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Units of work run by an [`Agent`](crate::Agent).
//!
//! A task goes from not started to running to done. `start` runs the prolog
//! and launches the task's command; `poll` checks the command's monitor and,
//! once it has exited, runs the epilog. A task without a command finishes on
//! its first poll. A failed task hands its `failure_tasks` to the agent.

mod abort;
mod host;
mod pending;
mod queue;
mod reparse;

pub use abort::AbortTask;
pub use host::{HostTask, HostTaskKind};
pub use pending::SetEntryPendingTask;
pub use queue::QueueTask;
pub use reparse::FinalReparseTask;

use tb_core::{Clock, HostId, QueueEntryId};
use tracing::debug;

use crate::context::SchedulerContext;
use crate::drone_manager::LaunchRequest;
use crate::error::DispatchError;
use crate::monitor::PidfileRunMonitor;

/// State every task carries.
#[derive(Debug, Default)]
pub(crate) struct TaskCore {
    monitor: Option<PidfileRunMonitor>,
    /// Log of the task's command, relative to the drone root.
    log_file: Option<String>,
    started: bool,
    done: bool,
    success: Option<bool>,
    failure_tasks: Vec<AgentTask>,
    queue_entry_ids: Vec<QueueEntryId>,
    host_ids: Vec<HostId>,
}

impl TaskCore {
    pub(crate) fn new(queue_entry_ids: Vec<QueueEntryId>, host_ids: Vec<HostId>) -> Self {
        Self { queue_entry_ids, host_ids, ..Self::default() }
    }

    pub(crate) fn launch<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>, request: LaunchRequest) {
        self.log_file = request.log_file.clone();
        let mut monitor = PidfileRunMonitor::new();
        monitor.run(ctx, request);
        self.monitor = Some(monitor);
    }

    /// Follow a pidfile written by a process launched elsewhere.
    pub(crate) fn attach<C: Clock>(
        &mut self,
        ctx: &mut SchedulerContext<C>,
        execution_tag: &str,
        pidfile_name: &str,
        num_processes: usize,
    ) {
        let mut monitor = PidfileRunMonitor::new();
        monitor.attach_to_existing_process(ctx, execution_tag, pidfile_name, num_processes);
        self.monitor = Some(monitor);
    }

    pub(crate) fn monitor(&self) -> Option<&PidfileRunMonitor> {
        self.monitor.as_ref()
    }

    /// Copy the command's log into the results repository and stop
    /// tracking its pidfile.
    fn cleanup<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) {
        let Some(monitor) = self.monitor.as_mut() else {
            return;
        };
        if let (Some(log_file), Some(process)) = (&self.log_file, monitor.process()) {
            ctx.drones.copy_to_results_repository(process, log_file, None);
        }
        monitor.release(ctx);
    }
}

#[derive(Debug)]
pub enum AgentTask {
    Host(HostTask),
    SetEntryPending(SetEntryPendingTask),
    Queue(QueueTask),
    FinalReparse(FinalReparseTask),
    Abort(AbortTask),
}

impl AgentTask {
    fn core(&self) -> &TaskCore {
        match self {
            Self::Host(task) => &task.core,
            Self::SetEntryPending(task) => &task.core,
            Self::Queue(task) => &task.core,
            Self::FinalReparse(task) => &task.core,
            Self::Abort(task) => &task.core,
        }
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        match self {
            Self::Host(task) => &mut task.core,
            Self::SetEntryPending(task) => &mut task.core,
            Self::Queue(task) => &mut task.core,
            Self::FinalReparse(task) => &mut task.core,
            Self::Abort(task) => &mut task.core,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Host(task) => task.kind().name(),
            Self::SetEntryPending(_) => "set_entry_pending",
            Self::Queue(_) => "queue",
            Self::FinalReparse(_) => "final_reparse",
            Self::Abort(_) => "abort",
        }
    }

    pub fn is_started(&self) -> bool {
        self.core().started
    }

    pub fn is_done(&self) -> bool {
        self.core().done
    }

    /// `None` until the task is done.
    pub fn success(&self) -> Option<bool> {
        self.core().success
    }

    pub fn failure_tasks(&self) -> &[AgentTask] {
        &self.core().failure_tasks
    }

    pub(crate) fn take_failure_tasks(&mut self) -> Vec<AgentTask> {
        std::mem::take(&mut self.core_mut().failure_tasks)
    }

    pub fn queue_entry_ids(&self) -> &[QueueEntryId] {
        &self.core().queue_entry_ids
    }

    pub fn host_ids(&self) -> &[HostId] {
        &self.core().host_ids
    }

    pub fn monitor(&self) -> Option<&PidfileRunMonitor> {
        self.core().monitor()
    }

    /// Run the prolog and launch the command.
    pub fn start<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        if self.core().started {
            return Ok(());
        }
        self.core_mut().started = true;
        debug!(task = self.name(), entries = ?self.queue_entry_ids(), "starting task");
        match self {
            Self::Host(task) => task.start(ctx),
            Self::SetEntryPending(task) => task.start(ctx),
            Self::Queue(task) => task.start(ctx),
            Self::FinalReparse(task) => task.start(ctx),
            Self::Abort(task) => task.start(ctx),
        }
    }

    /// Check on the task, finishing it once its command has exited.
    pub fn poll<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        if !self.core().started {
            self.start(ctx)?;
        }
        if self.core().done {
            return Ok(());
        }
        if let Self::FinalReparse(task) = self {
            if !task.try_start_parse(ctx) {
                return Ok(());
            }
        }
        let success = match self.core_mut().monitor.as_mut() {
            Some(monitor) => match monitor.exit_code(ctx) {
                Some(code) => code == 0,
                None => return Ok(()),
            },
            None => false,
        };
        self.finish(ctx, success)
    }

    pub(crate) fn finish<C: Clock>(
        &mut self,
        ctx: &mut SchedulerContext<C>,
        success: bool,
    ) -> Result<(), DispatchError> {
        let core = self.core_mut();
        if core.done {
            return Ok(());
        }
        core.done = true;
        core.success = Some(success);
        core.cleanup(ctx);
        debug!(task = self.name(), success, "task finished");
        match self {
            Self::Host(task) => task.epilog(ctx, success),
            Self::SetEntryPending(_) => Ok(()),
            Self::Queue(task) => task.epilog(ctx),
            Self::FinalReparse(task) => task.epilog(ctx),
            Self::Abort(task) => task.epilog(ctx),
        }
    }

    /// Stop the task, killing its process.
    pub fn abort<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        let core = self.core_mut();
        if core.done {
            return Ok(());
        }
        if let Some(monitor) = &core.monitor {
            monitor.kill(ctx);
        }
        core.done = true;
        debug!(task = self.name(), "task aborted");
        match self {
            Self::Queue(task) => task.on_abort(ctx),
            Self::FinalReparse(task) => task.on_abort(ctx),
            _ => {}
        }
        self.core_mut().cleanup(ctx);
        Ok(())
    }
}
