//! Command-line surface of `sepolicy-analyze`.

use crate::attribute::{list_attribute, AttributeArgs, QueryError};
use clap::{Parser, Subcommand};
use sepolicy_db::PolicyDatabase;
use std::io::{self, Write};
use std::path::PathBuf;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "sepolicy-analyze")]
#[command(about = "Inspect a compiled binary policy", long_about = None)]
pub struct Cli {
    /// Binary policy file
    pub policy: PathBuf,

    /// Query to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available queries
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the types of an attribute, or with --reverse the attributes of a type
    Attribute(AttributeArgs),
}

/// Errors from running a command
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// Lookup failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Output stream failed
    #[error("Failed to write results: {0}")]
    Output(#[from] io::Error),
}

/// Run `command` against `db`, one result name per line
///
/// Results are collected before anything is written, so a failed query
/// leaves `out` untouched.
///
/// # Errors
///
/// Returns error if the query fails or `out` cannot be written
pub fn execute(db: &PolicyDatabase, command: &Commands, out: &mut dyn Write) -> Result<(), AnalyzeError> {
    match command {
        Commands::Attribute(args) => {
            let names = list_attribute(db, &args.name, args.direction())?;
            for name in names {
                writeln!(out, "{name}")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
