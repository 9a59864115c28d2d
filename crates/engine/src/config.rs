// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Capacity of a drone that does not set its own.
    pub max_processes_per_drone: usize,
    /// Cap on the summed weight of agents started in one cycle.
    pub max_processes_started_per_cycle: usize,
    /// Concurrent results parses across all drones.
    pub max_parse_processes: usize,
    /// Abort requests handled per cycle.
    pub max_aborts_per_cycle: usize,
    /// A synchronous job still waiting for peers after this long is aborted.
    pub synch_job_start_timeout_minutes: u64,
    /// A launched process that has not written its pidfile after this long
    /// is treated as lost.
    pub pidfile_timeout_secs: u64,
    pub autoserv_path: String,
    pub parser_path: String,
    /// Pause between two cycles.
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_processes_per_drone: 50,
            max_processes_started_per_cycle: 50,
            max_parse_processes: 5,
            max_aborts_per_cycle: 50,
            synch_job_start_timeout_minutes: 240,
            pidfile_timeout_secs: 300,
            autoserv_path: "autoserv".to_string(),
            parser_path: "tko-parse".to_string(),
            tick_interval_ms: 5_000,
        }
    }
}

impl SchedulerConfig {
    tb_core::setters! {
        into {
            autoserv_path: String,
            parser_path: String,
        }
        set {
            max_processes_per_drone: usize,
            max_processes_started_per_cycle: usize,
            max_parse_processes: usize,
            max_aborts_per_cycle: usize,
            synch_job_start_timeout_minutes: u64,
            pidfile_timeout_secs: u64,
            tick_interval_ms: u64,
        }
    }

    pub fn pidfile_timeout(&self) -> Duration {
        Duration::from_secs(self.pidfile_timeout_secs)
    }

    pub fn synch_job_start_timeout(&self) -> Duration {
        Duration::from_secs(self.synch_job_start_timeout_minutes * 60)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
