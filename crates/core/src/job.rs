// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job records: one test payload to run on one or more hosts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{JobId, LabelId};

/// Ordered lowest to highest so `Ord` sorts by urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

crate::simple_display! {
    Priority {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Urgent => "Urgent",
    }
}

/// Where the control file executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlType {
    #[default]
    Server,
    Client,
}

crate::simple_display! {
    ControlType {
        Server => "Server",
        Client => "Client",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RebootBefore {
    Never,
    #[default]
    IfDirty,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RebootAfter {
    #[default]
    Never,
    IfAllTestsPassed,
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub priority: Priority,
    /// Path of the control file handed to the test runner.
    pub control_file: String,
    #[serde(default)]
    pub control_type: ControlType,
    /// Number of hosts that must start the payload together.
    #[serde(default = "default_synch_count")]
    pub synch_count: u32,
    #[serde(default)]
    pub dependency_labels: BTreeSet<LabelId>,
    #[serde(default)]
    pub reboot_before: RebootBefore,
    #[serde(default)]
    pub reboot_after: RebootAfter,
    #[serde(default = "default_run_verify")]
    pub run_verify: bool,
    pub created_on_ms: u64,
}

fn default_synch_count() -> u32 {
    1
}

fn default_run_verify() -> bool {
    true
}

impl Job {
    pub fn is_synchronous(&self) -> bool {
        self.synch_count > 1
    }

    /// Directory under the results repository holding every execution of this job.
    pub fn results_dir_name(&self) -> String {
        format!("{}-{}", self.id, self.owner)
    }

    /// `<job dir>/<subdir>`: names the results directory of one execution group.
    pub fn execution_tag(&self, execution_subdir: &str) -> String {
        format!("{}/{}", self.results_dir_name(), execution_subdir)
    }

    pub fn depends_on(&self, label: LabelId) -> bool {
        self.dependency_labels.contains(&label)
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            name: String = "test_job",
            owner: String = "my_user",
            control_file: String = "control",
        }
        set {
            id: JobId = JobId::new(1),
            priority: Priority = Priority::Medium,
            control_type: ControlType = ControlType::Server,
            synch_count: u32 = 1,
            dependency_labels: BTreeSet<LabelId> = BTreeSet::new(),
            reboot_before: RebootBefore = RebootBefore::Never,
            reboot_after: RebootAfter = RebootAfter::Never,
            run_verify: bool = true,
            created_on_ms: u64 = 1_000_000_000,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
