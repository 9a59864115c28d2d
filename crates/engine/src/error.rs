// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tb_core::{JobId, QueueEntryId};
use tb_storage::StoreError;
use thiserror::Error;

/// Errors raised while running one step of the scheduling cycle.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("no drones configured")]
    NoDrones,
    #[error("results drone {0} is not configured")]
    UnknownResultsDrone(String),
    #[error("job {0} has an empty execution group")]
    EmptyGroup(JobId),
    #[error("queue entry {entry} of job {job} has no execution group")]
    NoExecutionGroup { job: JobId, entry: QueueEntryId },
}
