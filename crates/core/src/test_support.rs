// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

/// Proptest strategies for protocol types.
pub mod strategies {
    use crate::pidfile::{PidfileContents, Process};
    use proptest::prelude::*;

    pub fn arb_process() -> impl Strategy<Value = Process> {
        ("[a-z][a-z0-9-]{0,11}", 1u32..4_000_000).prop_map(|(drone, pid)| Process::new(drone, pid))
    }

    /// Any pidfile a well-behaved writer can produce.
    pub fn arb_pidfile_contents() -> impl Strategy<Value = PidfileContents> {
        prop_oneof![
            Just(PidfileContents::default()),
            arb_process().prop_map(PidfileContents::running),
            (arb_process(), -255i32..256, 0u32..10_000)
                .prop_map(|(p, status, failed)| PidfileContents::exited(p, status, failed)),
        ]
    }
}
