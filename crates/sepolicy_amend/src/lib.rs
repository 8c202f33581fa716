//! seamend Amendment Pipeline
//!
//! Patches a base binary policy with incremental modules without a full
//! recompilation: load and decode the base, read and compile the modules,
//! amend, and write the result atomically.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod reader;

pub use backend::{CilCompiler, ModuleCompiler};
pub use config::{AmendConfig, UsageError};
pub use error::{AmendError, CompilerError, ErrorKind};
pub use pipeline::{AmendPipeline, AmendReport, PipelineState};
pub use reader::read_modules;
