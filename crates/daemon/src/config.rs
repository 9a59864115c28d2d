// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: a TOML file plus environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tb_engine::SchedulerConfig;

use crate::env;
use crate::lifecycle::LifecycleError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub drones: Vec<DroneConfig>,
    pub results: ResultsConfig,
    pub notify: NotifyConfig,
    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            drones: vec![DroneConfig { name: "localhost".to_string(), max_processes: None }],
            results: ResultsConfig::default(),
            notify: NotifyConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneConfig {
    pub name: String,
    /// Falls back to `scheduler.max_processes_per_drone`.
    #[serde(default)]
    pub max_processes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub drone: String,
    pub dir: PathBuf,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self { drone: "results".to_string(), dir: PathBuf::from("/usr/local/autotest/results") }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Defaults to the user running the daemon.
    pub from: Option<String>,
    /// Recipients; empty disables notifications.
    pub to: String,
    pub sendmail: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Install directory on every drone.
    pub drone_root: PathBuf,
    pub state_dir: Option<PathBuf>,
    /// Lab snapshot; defaults to `lab.json` in the state directory.
    pub snapshot: Option<PathBuf>,
    /// Daemon log; defaults to `tbd.log` in the state directory.
    pub log: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            drone_root: PathBuf::from("/usr/local/autotest"),
            state_dir: None,
            snapshot: None,
            log: None,
        }
    }
}

impl Config {
    /// Read `path` (or `TB_CONFIG`), falling back to defaults when neither
    /// is given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, LifecycleError> {
        let path = path.map(Path::to_path_buf).or_else(env::config_path);
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, LifecycleError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LifecycleError::ConfigRead(path.to_path_buf(), e))?;
        Self::parse(&text).map_err(|e| LifecycleError::ConfigParse(path.to_path_buf(), e))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn apply_env(&mut self) -> Result<(), LifecycleError> {
        if let Some(dir) = env::state_dir_override() {
            self.paths.state_dir = Some(dir);
        }
        if self.paths.state_dir.is_none() {
            self.paths.state_dir = Some(env::state_dir()?);
        }
        if let Some(to) = env::notify_to() {
            self.notify.to = to;
        }
        if let Some(interval) = env::tick_interval() {
            self.scheduler.tick_interval_ms = interval.as_millis() as u64;
        }
        Ok(())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.paths.state_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("tbd.pid")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.paths.snapshot.clone().unwrap_or_else(|| self.state_dir().join("lab.json"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.paths.log.clone().unwrap_or_else(|| self.state_dir().join("tbd.log"))
    }

    pub fn sendmail_path(&self) -> PathBuf {
        self.notify.sendmail.clone().unwrap_or_else(|| PathBuf::from("/usr/sbin/sendmail"))
    }

    /// Capacity of each configured drone.
    pub fn drone_capacities(&self) -> impl Iterator<Item = (&str, usize)> {
        self.drones.iter().map(|d| {
            (d.name.as_str(), d.max_processes.unwrap_or(self.scheduler.max_processes_per_drone))
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
