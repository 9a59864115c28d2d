// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tb-adapters: drones and operator mail

pub mod drone;
pub mod email;

pub use drone::{Drone, DroneCall, DroneError, DroneRefresh, LocalDrone};
pub use email::{
    current_user, parse_recipients, EmailNotificationManager, MailError, MailMessage,
    MailTransport, SendmailTransport,
};

#[cfg(any(test, feature = "test-support"))]
pub use drone::FakeDrone;
#[cfg(any(test, feature = "test-support"))]
pub use email::FakeMailTransport;
