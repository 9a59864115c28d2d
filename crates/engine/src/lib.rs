// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tb-engine: the scheduling cycle
//!
//! The [`Dispatcher`] owns every in-flight [`Agent`]. Each cycle it refreshes
//! drone state, processes aborts, binds queued entries to hosts, advances
//! agents under the process throttle, then flushes drone calls and email.

mod agent;
mod config;
mod context;
mod dispatcher;
mod drone_manager;
mod error;
mod host_scheduler;
mod monitor;
mod queue_entry;
mod recovery;
mod task;

#[cfg(test)]
mod test_helpers;

pub use agent::Agent;
pub use config::SchedulerConfig;
pub use context::SchedulerContext;
pub use dispatcher::Dispatcher;
pub use drone_manager::{DroneManager, DroneSpec, LaunchRequest, WORKING_DIRECTORY};
pub use error::DispatchError;
pub use host_scheduler::HostScheduler;
pub use monitor::PidfileRunMonitor;
pub use recovery::RecoverySummary;
pub use task::{
    AbortTask, AgentTask, FinalReparseTask, HostTask, HostTaskKind, QueueTask, SetEntryPendingTask,
};
