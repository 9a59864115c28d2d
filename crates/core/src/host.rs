// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host records: machines that queue entries run on.

use serde::{Deserialize, Serialize};

use crate::id::HostId;

/// Machine status as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HostStatus {
    #[default]
    Ready,
    Verifying,
    Repairing,
    Cleaning,
    Pending,
    Running,
    #[serde(rename = "Repair Failed")]
    RepairFailed,
    Dead,
    Rebooting,
}

crate::simple_display! {
    HostStatus {
        Ready => "Ready",
        Verifying => "Verifying",
        Repairing => "Repairing",
        Cleaning => "Cleaning",
        Pending => "Pending",
        Running => "Running",
        RepairFailed => "Repair Failed",
        Dead => "Dead",
        Rebooting => "Rebooting",
    }
}

impl HostStatus {
    /// Statuses a host is left in only while a host task is in flight.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Verifying | Self::Repairing | Self::Cleaning | Self::Pending)
    }
}

/// How much the repair step may do to a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protection {
    #[default]
    NoProtection,
    RepairSoftwareOnly,
    RepairFilesystemOnly,
    DoNotRepair,
    DoNotVerify,
}

crate::simple_display! {
    Protection {
        NoProtection => "NO_PROTECTION",
        RepairSoftwareOnly => "REPAIR_SOFTWARE_ONLY",
        RepairFilesystemOnly => "REPAIR_FILESYSTEM_ONLY",
        DoNotRepair => "DO_NOT_REPAIR",
        DoNotVerify => "DO_NOT_VERIFY",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub hostname: String,
    #[serde(default)]
    pub status: HostStatus,
    #[serde(default)]
    pub locked: bool,
    /// Invalid hosts have been deleted from the UI; they still serve
    /// entries that name them explicitly but never metahosts.
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub protection: Protection,
    /// Set after a payload ran; `reboot_before = IfDirty` cleans such hosts.
    #[serde(default)]
    pub dirty: bool,
}

impl Host {
    /// Ready and unlocked. Whether it is free of active entries is a store question.
    pub fn is_available(&self) -> bool {
        self.status == HostStatus::Ready && !self.locked
    }
}

crate::builder! {
    pub struct HostBuilder => Host {
        into {
            hostname: String = "host1",
        }
        set {
            id: HostId = HostId::new(1),
            status: HostStatus = HostStatus::Ready,
            locked: bool = false,
            invalid: bool = false,
            protection: Protection = Protection::NoProtection,
            dirty: bool = false,
        }
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
