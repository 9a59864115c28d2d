// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tb-core: records and protocol types shared by the testbed scheduler crates

pub mod macros;

pub mod acl;
pub mod clock;
pub mod host;
pub mod id;
pub mod job;
pub mod label;
pub mod pidfile;
pub mod queue_entry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use acl::{AclGroup, EVERYONE_GROUP};
pub use clock::{Clock, FakeClock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use host::HostBuilder;
pub use host::{Host, HostStatus, Protection};
pub use id::{AclGroupId, HostId, JobId, LabelId, QueueEntryId};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{ControlType, Job, Priority, RebootAfter, RebootBefore};
pub use label::Label;
pub use pidfile::{
    PidfileContents, PidfileError, PidfileId, Process, RunState, AUTOSERV_PIDFILE, PARSER_PIDFILE,
};
#[cfg(any(test, feature = "test-support"))]
pub use queue_entry::HostQueueEntryBuilder;
pub use queue_entry::{HostBlock, HostQueueEntry, QueueEntryStatus};
