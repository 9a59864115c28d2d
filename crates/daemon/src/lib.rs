// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tb-daemon: the `tbd` scheduler process
//!
//! Loads the daemon config, takes the state directory lock, rebuilds
//! in-flight work from the lab snapshot and runs scheduling cycles until
//! signalled.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod env;
pub mod lifecycle;
pub mod logging;

pub use config::Config;
pub use lifecycle::{cancel_on_signal, startup, Daemon, LifecycleError};
