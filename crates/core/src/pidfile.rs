// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pidfile protocol: how the scheduler learns about remote processes
//! without holding a connection to them.
//!
//! A pidfile holds up to three lines: the pid once the process has started,
//! then its exit status and the number of failed tests once it has exited.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the pidfile written by the test runner for payload and host tasks.
pub const AUTOSERV_PIDFILE: &str = ".autoserv_execute";
/// Name of the pidfile written by the results parser.
pub const PARSER_PIDFILE: &str = ".parser_execute";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PidfileError {
    #[error("corrupt pidfile ({0} lines)")]
    TooManyLines(usize),
    #[error("corrupt pidfile line {line}: {value:?}")]
    BadNumber { line: usize, value: String },
    #[error("pidfile has an exit status but no failed test count")]
    MissingTestCount,
}

/// A process on a specific drone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Process {
    pub drone: String,
    pub pid: u32,
}

impl Process {
    pub fn new(drone: impl Into<String>, pid: u32) -> Self {
        Self { drone: drone.into(), pid }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.drone, self.pid)
    }
}

/// Handle to a pidfile: its absolute path on the drone that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PidfileId(PathBuf);

impl PidfileId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for PidfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// What a pidfile says about its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotYetRun,
    Running,
    Exited { exit_status: i32, num_tests_failed: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidfileContents {
    pub process: Option<Process>,
    pub exit_status: Option<i32>,
    pub num_tests_failed: Option<u32>,
}

impl PidfileContents {
    pub fn running(process: Process) -> Self {
        Self { process: Some(process), exit_status: None, num_tests_failed: None }
    }

    pub fn exited(process: Process, exit_status: i32, num_tests_failed: u32) -> Self {
        Self {
            process: Some(process),
            exit_status: Some(exit_status),
            num_tests_failed: Some(num_tests_failed),
        }
    }

    /// Parse the text of a pidfile read from `drone`. `None` means the file
    /// does not exist yet.
    pub fn parse(drone: &str, text: Option<&str>) -> Result<Self, PidfileError> {
        let Some(text) = text else {
            return Ok(Self::default());
        };
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.len() > 3 {
            return Err(PidfileError::TooManyLines(lines.len()));
        }
        let Some(first) = lines.first() else {
            return Ok(Self::default());
        };
        let pid = parse_line(0, first)?;
        let mut contents = Self::running(Process::new(drone, pid));
        if let Some(status) = lines.get(1) {
            let failed = lines.get(2).ok_or(PidfileError::MissingTestCount)?;
            contents.exit_status = Some(parse_line(1, status)?);
            contents.num_tests_failed = Some(parse_line(2, failed)?);
        }
        Ok(contents)
    }

    /// Render in the on-disk format, one value per line.
    pub fn to_file_text(&self) -> String {
        let mut text = String::new();
        if let Some(process) = &self.process {
            text.push_str(&format!("{}\n", process.pid));
            if let (Some(status), Some(failed)) = (self.exit_status, self.num_tests_failed) {
                text.push_str(&format!("{status}\n{failed}\n"));
            }
        }
        text
    }

    pub fn state(&self) -> RunState {
        match (&self.process, self.exit_status) {
            (None, _) => RunState::NotYetRun,
            (Some(_), None) => RunState::Running,
            (Some(_), Some(exit_status)) => RunState::Exited {
                exit_status,
                num_tests_failed: self.num_tests_failed.unwrap_or(0),
            },
        }
    }
}

fn parse_line<T: std::str::FromStr>(line: usize, value: &str) -> Result<T, PidfileError> {
    value.parse().map_err(|_| PidfileError::BadNumber { line, value: value.to_string() })
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
