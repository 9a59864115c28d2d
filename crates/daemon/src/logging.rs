// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup: an `EnvFilter` (default `info`) over a non-blocking file
//! writer.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::lifecycle::LifecycleError;

const DEFAULT_FILTER: &str = "info";

/// Route tracing output to `log_path`. Keep the guard alive for the life of
/// the process; dropping it flushes the writer.
pub fn init(log_path: &Path) -> Result<WorkerGuard, LifecycleError> {
    let file_name = log_path
        .file_name()
        .ok_or_else(|| LifecycleError::Logging(format!("{} is not a file", log_path.display())))?;
    let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| LifecycleError::Logging(e.to_string()))?;
    Ok(guard)
}

/// `RUST_LOG` if set and valid, else the default.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
