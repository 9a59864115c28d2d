// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One unit of host work: an ordered queue of tasks.

use std::collections::VecDeque;

use tb_core::{Clock, HostId, QueueEntryId};
use tracing::{debug, warn};

use crate::context::SchedulerContext;
use crate::error::DispatchError;
use crate::task::AgentTask;

/// Runs its tasks in order, one at a time, and is done when the queue
/// drains. When a task fails, its failure tasks replace whatever remained
/// queued.
#[derive(Debug)]
pub struct Agent {
    active_task: Option<AgentTask>,
    queue: VecDeque<AgentTask>,
    num_processes: usize,
    queue_entry_ids: Vec<QueueEntryId>,
    host_ids: Vec<HostId>,
}

impl Agent {
    pub fn new(tasks: Vec<AgentTask>, num_processes: usize) -> Self {
        let mut queue_entry_ids = Vec::new();
        let mut host_ids = Vec::new();
        for task in &tasks {
            queue_entry_ids.extend_from_slice(task.queue_entry_ids());
            host_ids.extend_from_slice(task.host_ids());
        }
        queue_entry_ids.sort();
        queue_entry_ids.dedup();
        host_ids.sort();
        host_ids.dedup();
        Self { active_task: None, queue: tasks.into(), num_processes, queue_entry_ids, host_ids }
    }

    /// Weight counted against the process throttles.
    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    pub fn queue_entry_ids(&self) -> &[QueueEntryId] {
        &self.queue_entry_ids
    }

    pub fn host_ids(&self) -> &[HostId] {
        &self.host_ids
    }

    pub fn active_task(&self) -> Option<&AgentTask> {
        self.active_task.as_ref()
    }

    /// Tasks waiting behind the active one.
    pub fn queued_tasks(&self) -> impl Iterator<Item = &AgentTask> {
        self.queue.iter()
    }

    /// Has started its first task and not yet finished.
    pub fn is_running(&self) -> bool {
        self.active_task.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.active_task.is_none() && self.queue.is_empty()
    }

    /// Advance as far as possible this cycle.
    pub fn tick<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        loop {
            if let Some(task) = self.active_task.as_mut() {
                if !task.is_done() {
                    task.poll(ctx)?;
                    if !task.is_done() {
                        return Ok(());
                    }
                }
            }
            self.next_task(ctx)?;
            if self.active_task.is_none() {
                return Ok(());
            }
        }
    }

    fn next_task<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        if let Some(mut finished) = self.active_task.take() {
            if finished.success() != Some(true) {
                let failure_tasks = finished.take_failure_tasks();
                debug!(task = finished.name(), failure_tasks = failure_tasks.len(), "task failed");
                self.queue = failure_tasks.into();
            }
        }
        let Some(task) = self.queue.pop_front() else {
            return Ok(());
        };
        let task = self.active_task.insert(task);
        if let Err(e) = task.start(ctx) {
            warn!(task = task.name(), error = %e, "task failed to start");
            // Failed, so its failure tasks run on the next tick.
            task.finish(ctx, false)?;
            return Err(e);
        }
        Ok(())
    }

    /// Abort the active task and drop the rest.
    pub fn abort<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        if let Some(task) = self.active_task.as_mut() {
            task.abort(ctx)?;
        }
        self.active_task = None;
        self.queue.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
