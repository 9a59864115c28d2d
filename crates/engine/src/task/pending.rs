// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tb_core::{Clock, HostId, QueueEntryId};

use super::{AgentTask, TaskCore};
use crate::context::SchedulerContext;
use crate::error::DispatchError;
use crate::queue_entry;

/// Last pre-job step: the entry waits in Pending until its peers are ready.
/// Runs no command.
#[derive(Debug)]
pub struct SetEntryPendingTask {
    pub(super) core: TaskCore,
    entry: QueueEntryId,
}

impl SetEntryPendingTask {
    pub fn entry(&self) -> QueueEntryId {
        self.entry
    }

    pub(super) fn start<C: Clock>(&mut self, ctx: &mut SchedulerContext<C>) -> Result<(), DispatchError> {
        self.core.done = true;
        self.core.success = Some(true);
        queue_entry::on_pending(ctx, self.entry)
    }
}

impl AgentTask {
    pub fn set_entry_pending(entry: QueueEntryId, host: HostId) -> Self {
        Self::SetEntryPending(SetEntryPendingTask {
            core: TaskCore::new(vec![entry], vec![host]),
            entry,
        })
    }
}
