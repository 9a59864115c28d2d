// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tb_core::{Clock, QueueEntryId, QueueEntryStatus};
use tb_storage::StoreExt;
use tracing::info;

use super::{AgentTask, TaskCore};
use crate::agent::Agent;
use crate::context::SchedulerContext;
use crate::error::DispatchError;

/// Stops the agents working on an entry, then marks it Aborted. Always
/// succeeds.
#[derive(Debug)]
pub struct AbortTask {
    pub(super) core: TaskCore,
    entry: QueueEntryId,
    agents_to_abort: Vec<Agent>,
}

impl AbortTask {
    pub fn entry(&self) -> QueueEntryId {
        self.entry
    }

    pub fn agents_to_abort(&self) -> &[Agent] {
        &self.agents_to_abort
    }

    pub(super) fn start<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        for agent in &mut self.agents_to_abort {
            agent.abort(ctx)?;
        }
        Ok(())
    }

    pub(super) fn epilog<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        ctx.store.set_entry_status(self.entry, QueueEntryStatus::Aborted)?;
        info!(entry = %self.entry, "entry aborted");
        self.core.success = Some(true);
        Ok(())
    }
}

impl AgentTask {
    pub fn abort_entry(entry: QueueEntryId, agents_to_abort: Vec<Agent>) -> Self {
        let mut host_ids: Vec<_> =
            agents_to_abort.iter().flat_map(|agent| agent.host_ids().iter().copied()).collect();
        host_ids.sort();
        host_ids.dedup();
        Self::Abort(AbortTask { core: TaskCore::new(vec![entry], host_ids), entry, agents_to_abort })
    }
}

#[cfg(test)]
#[path = "abort_tests.rs"]
mod tests;
