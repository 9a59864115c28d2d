// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State shared by the dispatcher, its agents and their tasks for one
//! scheduler instance.

use std::sync::Arc;

use tb_adapters::EmailNotificationManager;
use tb_core::Clock;
use tb_storage::Store;

use crate::agent::Agent;
use crate::config::SchedulerConfig;
use crate::drone_manager::DroneManager;

pub struct SchedulerContext<C: Clock> {
    pub store: Arc<dyn Store>,
    pub drones: DroneManager,
    pub email: EmailNotificationManager,
    pub config: SchedulerConfig,
    pub clock: C,
    running_parses: usize,
    /// Agents created during the cycle; the dispatcher adopts them at the
    /// end of agent handling.
    new_agents: Vec<Agent>,
}

impl<C: Clock> SchedulerContext<C> {
    pub fn new(
        store: Arc<dyn Store>,
        drones: DroneManager,
        email: EmailNotificationManager,
        config: SchedulerConfig,
        clock: C,
    ) -> Self {
        Self { store, drones, email, config, clock, running_parses: 0, new_agents: Vec::new() }
    }

    pub fn add_agent(&mut self, agent: Agent) {
        self.new_agents.push(agent);
    }

    pub(crate) fn take_new_agents(&mut self) -> Vec<Agent> {
        std::mem::take(&mut self.new_agents)
    }

    pub(crate) fn new_agents_mut(&mut self) -> &mut Vec<Agent> {
        &mut self.new_agents
    }

    pub fn running_parses(&self) -> usize {
        self.running_parses
    }

    pub(crate) fn can_run_new_parse(&self) -> bool {
        self.running_parses < self.config.max_parse_processes
    }

    pub(crate) fn parse_started(&mut self) {
        self.running_parses += 1;
    }

    pub(crate) fn parse_finished(&mut self) {
        self.running_parses = self.running_parses.saturating_sub(1);
    }
}
