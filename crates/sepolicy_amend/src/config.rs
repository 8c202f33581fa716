//! Amendment run configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// Usage errors, detected before any file is touched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// `--base` or `--output` missing
    #[error("Please specify required arguments.")]
    MissingRequired,

    /// No incremental module files given
    #[error("Please specify at least one module file.")]
    NoModules,

    /// Option not understood
    #[error("Unsupported option: {0}.")]
    Unsupported(String),
}

/// Immutable description of one amendment run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendConfig {
    /// Base binary policy
    base: PathBuf,
    /// Destination of the amended policy
    output: PathBuf,
    /// Incremental modules, applied in this order
    modules: Vec<PathBuf>,
    /// Number of `-v` flags
    verbosity: u8,
}

impl AmendConfig {
    /// Create a configuration with the default verbosity
    ///
    /// # Errors
    ///
    /// Returns error if no module files are given
    pub fn new(
        base: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        modules: Vec<PathBuf>,
    ) -> Result<Self, UsageError> {
        let config = Self {
            base: base.into(),
            output: output.into(),
            modules,
            verbosity: 0,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from parsed command-line values
    ///
    /// # Errors
    ///
    /// Returns error if a required path is missing or no modules are given
    pub fn from_args(
        base: Option<PathBuf>,
        output: Option<PathBuf>,
        modules: Vec<PathBuf>,
        verbosity: u8,
    ) -> Result<Self, UsageError> {
        let (Some(base), Some(output)) = (base, output) else {
            return Err(UsageError::MissingRequired);
        };
        Ok(Self::new(base, output, modules)?.with_verbosity(verbosity))
    }

    /// Set verbosity
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Check the configuration
    ///
    /// # Errors
    ///
    /// Returns error if no module files are given
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.modules.is_empty() {
            return Err(UsageError::NoModules);
        }
        Ok(())
    }

    /// Base binary policy path
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Output path
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Module paths in application order
    #[must_use]
    pub fn modules(&self) -> &[PathBuf] {
        &self.modules
    }

    /// Number of `-v` flags
    #[must_use]
    pub const fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Log threshold for the verbosity: errors only by default, one level
    /// more per flag
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::ERROR,
            1 => LevelFilter::WARN,
            2 => LevelFilter::INFO,
            3 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}
