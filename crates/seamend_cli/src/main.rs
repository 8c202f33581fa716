//! seamend
//!
//! Amend a binary policy with incremental CIL modules.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{ArgAction, Parser};
use color_eyre::Result;
use sepolicy_amend::{AmendConfig, AmendPipeline, UsageError};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: seamend [OPTION]... FILE...
Amend a binary policy with incremental CIL modules.

Options:
  -b, --base=FILE     base binary policy (required)
  -o, --output=FILE   where to write the amended policy (required)
  -v, --verbose       raise log verbosity, repeatable
  -h, --help          print this help and exit
";

#[derive(Debug, Parser)]
#[command(name = "seamend")]
#[command(override_usage = "seamend [OPTION]... FILE...")]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// Base binary policy; the last occurrence wins
    #[arg(short, long, value_name = "FILE", overrides_with = "base")]
    base: Option<PathBuf>,

    /// Output binary policy; the last occurrence wins
    #[arg(short, long, value_name = "FILE", overrides_with = "output")]
    output: Option<PathBuf>,

    /// Raise log verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print usage
    #[arg(short, long, action = ArgAction::SetTrue)]
    help: bool,

    /// Incremental module files, applied in order
    #[arg(value_name = "FILE")]
    modules: Vec<PathBuf>,
}

/// Outcome of command-line parsing
#[derive(Debug)]
enum Invocation {
    Help,
    Run(AmendConfig),
}

fn parse<I, T>(args: I) -> Result<Invocation, UsageError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| {
        let detail = e.to_string();
        let first = detail.lines().next().unwrap_or_default();
        UsageError::Unsupported(first.trim_start_matches("error: ").to_string())
    })?;

    if cli.help {
        return Ok(Invocation::Help);
    }

    let config = AmendConfig::from_args(cli.base, cli.output, cli.modules, cli.verbose)?;
    Ok(Invocation::Run(config))
}

/// Exit status of help and usage errors
const USAGE_STATUS: u8 = 1;

fn show_usage(out: &mut dyn Write) -> io::Result<u8> {
    out.write_all(USAGE.as_bytes())?;
    out.flush()?;
    Ok(USAGE_STATUS)
}

fn init_tracing(config: &AmendConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(config.log_level().into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let config = match parse(std::env::args_os()) {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => return Ok(ExitCode::from(show_usage(&mut io::stdout())?)),
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::from(show_usage(&mut io::stdout())?));
        }
    };

    init_tracing(&config);
    tracing::debug!(?config, "starting amendment");

    // The pipeline logs its own failure with the stage reached
    match AmendPipeline::new().run(&config) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => Ok(ExitCode::from(err.exit_code())),
    }
}
