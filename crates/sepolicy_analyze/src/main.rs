//! sepolicy-analyze
//!
//! Query a compiled binary policy.

#![warn(clippy::all)]

use clap::error::ErrorKind;
use clap::Parser;
use color_eyre::Result;
use sepolicy_analyze::{execute, load_policy, Cli, ATTRIBUTE_USAGE};
use sepolicy_db::BinaryPolicyCodec;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            err.print()?;
            eprintln!("{ATTRIBUTE_USAGE}");
            return Ok(ExitCode::FAILURE);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let db = match load_policy(&cli.policy, &BinaryPolicyCodec::new()) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match execute(&db, &cli.command, &mut out) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("{err}");
            Ok(ExitCode::FAILURE)
        }
    }
}
