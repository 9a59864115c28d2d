// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduling cycle.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use tb_core::{Clock, Host, HostId, HostQueueEntry, Job, JobId, QueueEntryId, QueueEntryStatus};
use tb_storage::StoreExt;
use tracing::{debug, error, info};

use crate::agent::Agent;
use crate::context::SchedulerContext;
use crate::error::DispatchError;
use crate::host_scheduler::HostScheduler;
use crate::queue_entry;

/// Owns every in-flight [`Agent`] and drives them one cycle at a time.
pub struct Dispatcher<C: Clock> {
    ctx: SchedulerContext<C>,
    agents: Vec<Agent>,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(ctx: SchedulerContext<C>) -> Self {
        Self { ctx, agents: Vec::new() }
    }

    pub fn context(&self) -> &SchedulerContext<C> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SchedulerContext<C> {
        &mut self.ctx
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Weight of the agents that have started and not finished.
    pub fn num_running_processes(&self) -> usize {
        self.agents.iter().filter(|a| a.is_running()).map(Agent::num_processes).sum()
    }

    /// Agents working on `entry`.
    pub fn agents_for_entry(&self, entry: QueueEntryId) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(move |a| a.queue_entry_ids().contains(&entry))
    }

    /// Run one full cycle. Failing steps are logged and reported; later
    /// steps still run.
    pub async fn tick(&mut self) {
        self.ctx.drones.refresh().await;
        let result = self.find_aborting();
        self.report("find_aborting", result);
        let result = self.abort_jobs_past_synch_start_timeout();
        self.report("abort_jobs_past_synch_start_timeout", result);
        let result = self.schedule_new_jobs();
        self.report("schedule_new_jobs", result);
        self.handle_agents();
        self.ctx.drones.execute_actions().await;
        self.ctx.email.send_queued_emails().await;
    }

    fn report(&mut self, step: &str, result: Result<(), DispatchError>) {
        if let Err(e) = result {
            error!(step, error = %e, "scheduler step failed");
            self.ctx.email.log_stacktrace(step, &e);
        }
    }

    /// Agents created since the last cycle join the dispatcher.
    pub(crate) fn adopt_new_agents(&mut self) {
        let new_agents = self.ctx.take_new_agents();
        self.agents.extend(new_agents);
    }

    /// Remove and return the agents working on `entry`, including ones
    /// created this cycle.
    fn take_agents_for_entry(&mut self, entry: QueueEntryId) -> Vec<Agent> {
        let (mut taken, kept): (Vec<Agent>, Vec<Agent>) = std::mem::take(&mut self.agents)
            .into_iter()
            .partition(|a| a.queue_entry_ids().contains(&entry));
        self.agents = kept;
        let new_agents = self.ctx.new_agents_mut();
        let (pending, kept): (Vec<Agent>, Vec<Agent>) = std::mem::take(new_agents)
            .into_iter()
            .partition(|a| a.queue_entry_ids().contains(&entry));
        *new_agents = kept;
        taken.extend(pending);
        taken
    }

    /// Hand entries marked Abort to abort agents.
    pub fn find_aborting(&mut self) -> Result<(), DispatchError> {
        let limit = self.ctx.config.max_aborts_per_cycle;
        let aborting = self.ctx.store.queue_entries(&|e| e.status == QueueEntryStatus::Abort);
        if aborting.len() > limit {
            info!(count = aborting.len(), limit, "deferring aborts to later cycles");
        }
        for entry in aborting.into_iter().take(limit) {
            let agents = self.take_agents_for_entry(entry.id);
            queue_entry::abort_entry(&mut self.ctx, &entry, agents)?;
        }
        Ok(())
    }

    /// Abort synchronous jobs whose peers have waited in Pending too long.
    pub fn abort_jobs_past_synch_start_timeout(&mut self) -> Result<(), DispatchError> {
        let timeout = self.ctx.config.synch_job_start_timeout();
        let everyone: BTreeSet<HostId> = self
            .ctx
            .store
            .acl_groups(&|g| g.is_everyone())
            .into_iter()
            .flat_map(|g| g.hosts)
            .collect();
        let waiting: BTreeSet<JobId> = self
            .ctx
            .store
            .queue_entries(&|e| e.status == QueueEntryStatus::Pending && e.active)
            .into_iter()
            .filter(|e| e.host_id.is_some_and(|h| everyone.contains(&h)))
            .map(|e| e.job_id)
            .collect();
        for job in waiting {
            let job = self.ctx.store.job(job)?;
            let age = self.ctx.clock.age_of(job.created_on_ms);
            if age > timeout {
                info!(job = %job.id, age_secs = age.as_secs(), "aborting job past synch start timeout");
                queue_entry::abort_job(&mut self.ctx, job.id)?;
            }
        }
        Ok(())
    }

    /// Bind queued entries to free hosts, best first.
    pub fn schedule_new_jobs(&mut self) -> Result<(), DispatchError> {
        let mut scheduler = HostScheduler::new(self.ctx.store.as_ref());
        let jobs: HashMap<JobId, Job> =
            self.ctx.store.jobs(&|_| true).into_iter().map(|j| (j.id, j)).collect();
        let mut candidates: Vec<(HostQueueEntry, &Job)> = self
            .ctx
            .store
            .queue_entries(&HostQueueEntry::is_schedulable)
            .into_iter()
            .filter_map(|e| jobs.get(&e.job_id).map(|job| (e, job)))
            .collect();
        candidates.sort_by_key(|(e, job)| {
            (Reverse(job.priority), e.is_metahost(), job.created_on_ms, job.id, e.id)
        });
        for (entry, job) in candidates {
            if let Some(host) = scheduler.find_eligible_host(&entry, job) {
                self.schedule_entry(&entry, &host)?;
            }
        }
        Ok(())
    }

    fn schedule_entry(&mut self, entry: &HostQueueEntry, host: &Host) -> Result<(), DispatchError> {
        let entry = self.ctx.store.update_queue_entry(entry.id, &mut |e| e.host_id = Some(host.id))?;
        if entry.is_metahost() {
            self.ctx.store.recompute_blocks(entry.job_id)?;
        }
        info!(entry = %entry.id, job = %entry.job_id, host = %host.hostname, "scheduling entry");
        let agent = queue_entry::run(&mut self.ctx, &entry)?;
        self.ctx.add_agent(agent);
        Ok(())
    }

    /// Tick every agent once, starting new ones under the process
    /// throttles, then drop the finished and adopt the new.
    pub fn handle_agents(&mut self) {
        let mut agents = std::mem::take(&mut self.agents);
        let mut started = 0;
        let mut reached_limit = false;
        for agent in &mut agents {
            if !agent.is_running() {
                if !self.can_start_agent(agent, started, reached_limit) {
                    reached_limit = true;
                    continue;
                }
                started += agent.num_processes();
            }
            if let Err(e) = agent.tick(&mut self.ctx) {
                self.report("handle_agents", Err(e));
            }
        }
        agents.retain(|a| !a.is_done());
        debug!(agents = agents.len(), started, "handled agents");
        self.agents = agents;
        self.adopt_new_agents();
    }

    fn can_start_agent(&self, agent: &Agent, started: usize, reached_limit: bool) -> bool {
        let weight = agent.num_processes();
        if weight == 0 {
            return true;
        }
        // Once one agent is held back, later ones wait too.
        if reached_limit {
            return false;
        }
        if weight > self.ctx.drones.max_runnable_processes() {
            return false;
        }
        if started == 0 {
            return true;
        }
        started + weight <= self.ctx.config.max_processes_started_per_cycle
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
