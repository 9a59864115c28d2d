// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tbd`: lab test scheduler daemon.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tb_daemon::{cancel_on_signal, logging, startup, Config, LifecycleError};
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "tbd", version, about = "Schedule lab test jobs onto hosts and drones")]
struct Args {
    /// Config file (TOML). Defaults to $TB_CONFIG, then built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single scheduling cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "tbd failed");
            eprintln!("tbd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), LifecycleError> {
    let config = Config::load(args.config.as_deref())?;
    let _guard = logging::init(&config.log_path())?;
    let mut daemon = startup(config).await?;
    if args.once {
        daemon.tick().await;
    } else {
        let cancel = CancellationToken::new();
        cancel_on_signal(cancel.clone());
        daemon.run(&cancel).await;
    }
    daemon.shutdown().await
}
