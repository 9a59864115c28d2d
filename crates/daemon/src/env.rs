// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Config file named by `TB_CONFIG`.
pub fn config_path() -> Option<PathBuf> {
    std::env::var("TB_CONFIG").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// State directory override from `TB_STATE_DIR`.
pub fn state_dir_override() -> Option<PathBuf> {
    std::env::var("TB_STATE_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Resolve state directory: TB_STATE_DIR > XDG state dir/tbd > ~/.local/state/tbd
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = state_dir_override() {
        return Ok(dir);
    }
    if let Some(dir) = dirs::state_dir() {
        return Ok(dir.join("tbd"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/tbd"))
}

/// Notification recipients from `TB_NOTIFY_TO`.
pub fn notify_to() -> Option<String> {
    std::env::var("TB_NOTIFY_TO").ok()
}

/// Cycle interval override from `TB_TICK_MS`.
pub fn tick_interval() -> Option<Duration> {
    std::env::var("TB_TICK_MS").ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
