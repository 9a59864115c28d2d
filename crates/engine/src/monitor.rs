// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracks one remote process through its pidfile.

use std::time::Instant;

use tb_core::{Clock, PidfileContents, PidfileId, Process, RunState};
use tracing::{info, warn};

use crate::context::SchedulerContext;
use crate::drone_manager::LaunchRequest;

/// Follows a process from launch (or attach) to exit.
///
/// A process that never writes its pidfile, or dies without writing an exit
/// status, is declared lost: it reads as exited with status 1 and no failed
/// tests, and operators are notified.
#[derive(Debug, Default)]
pub struct PidfileRunMonitor {
    pidfile_id: Option<PidfileId>,
    start_time: Option<Instant>,
    state: PidfileContents,
    lost_process: bool,
}

impl PidfileRunMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch a process and start watching its pidfile.
    pub fn run<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>, request: LaunchRequest) {
        self.pidfile_id = Some(ctx.drones.execute_command(request));
        self.start_time = Some(ctx.clock.now());
    }

    /// Watch a pidfile written by a process this monitor did not launch.
    pub fn attach_to_existing_process<C: Clock>(
        &mut self,
        ctx: &mut SchedulerContext<C>,
        execution_tag: &str,
        pidfile_name: &str,
        num_processes: usize,
    ) {
        let id = ctx.drones.get_pidfile_id_from(execution_tag, pidfile_name);
        ctx.drones.attach_pidfile(&id, num_processes);
        self.pidfile_id = Some(id);
        self.start_time = Some(ctx.clock.now());
    }

    pub fn has_process(&self) -> bool {
        self.state.process.is_some()
    }

    pub fn process(&self) -> Option<&Process> {
        self.state.process.as_ref()
    }

    pub fn pidfile_id(&self) -> Option<&PidfileId> {
        self.pidfile_id.as_ref()
    }

    pub fn lost_process(&self) -> bool {
        self.lost_process
    }

    /// Refresh from the drone cache and return the exit status, if exited.
    pub fn exit_code<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Option<i32> {
        self.update(ctx);
        self.state.exit_status
    }

    /// Failed test count of an exited process.
    pub fn num_tests_failed(&self) -> Option<u32> {
        self.state.num_tests_failed
    }

    pub fn kill<C: Clock>(&self, ctx: &mut SchedulerContext<C>) {
        if let Some(process) = &self.state.process {
            ctx.drones.kill_process(process);
        }
    }

    /// Stop tracking the pidfile.
    pub fn release<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) {
        if let Some(id) = self.pidfile_id.take() {
            ctx.drones.unregister_pidfile(&id);
        }
    }

    fn update<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) {
        if self.lost_process || self.state.exit_status.is_some() {
            return;
        }
        let Some(id) = self.pidfile_id.clone() else {
            return;
        };
        match ctx.drones.get_pidfile_contents(&id, false) {
            Ok(contents) => self.state = contents,
            Err(e) => {
                self.handle_pidfile_error(ctx, "Pidfile error", &format!("{id}: {e}"));
                return;
            }
        }
        match self.state.state() {
            RunState::NotYetRun => self.handle_no_process(ctx, &id),
            RunState::Running => {
                let Some(process) = self.state.process.clone() else {
                    return;
                };
                if ctx.drones.is_process_running(&process) {
                    return;
                }
                // The process may have exited between the pidfile read and
                // the process listing.
                match ctx.drones.get_pidfile_contents(&id, true) {
                    Ok(contents) => self.state = contents,
                    Err(e) => {
                        self.handle_pidfile_error(ctx, "Pidfile error", &format!("{id}: {e}"));
                        return;
                    }
                }
                if self.state.exit_status.is_none() {
                    let message = format!("Process {process} ({id}) died without writing an exit code");
                    self.handle_pidfile_error(ctx, "Process died", &message);
                }
            }
            RunState::Exited { .. } => {}
        }
    }

    fn handle_no_process<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>, id: &PidfileId) {
        let Some(start) = self.start_time else {
            return;
        };
        let timeout = ctx.config.pidfile_timeout();
        if ctx.clock.now().duration_since(start) < timeout {
            return;
        }
        let message = format!("No pid found at {id} after {}s", timeout.as_secs());
        ctx.email.enqueue_notify_email("Process has failed to write pidfile", &message);
        let dummy = ctx.drones.dummy_process();
        self.on_lost_process(dummy);
    }

    fn handle_pidfile_error<C: Clock>(
        &mut self,
        ctx: &mut SchedulerContext<C>,
        subject: &str,
        message: &str,
    ) {
        warn!(%subject, "{message}");
        ctx.email.enqueue_notify_email(subject, message);
        let process = match self.state.process.clone() {
            Some(process) => process,
            None => ctx.drones.dummy_process(),
        };
        self.on_lost_process(process);
    }

    fn on_lost_process(&mut self, process: Process) {
        info!(%process, "lost process");
        self.lost_process = true;
        self.state = PidfileContents::exited(process, 1, 0);
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
