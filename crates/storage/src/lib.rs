// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tb-storage: record store used by the scheduler

mod memory;
mod ops;
mod state;
mod store;

pub use memory::MemoryStore;
pub use ops::StoreExt;
pub use state::{LabSnapshot, LabState};
pub use store::{Store, StoreError};
