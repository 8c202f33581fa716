//! seamend Incremental Module Compiler
//!
//! Parses incremental policy modules, resolves them as one set and
//! amends a decoded base policy with the result.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod lang;

pub use compiler::{
    AmendSummary, Assignment, CilError, CompiledModules, Declaration, Module, ModuleDb,
};
pub use lang::{ModuleParser, ParseError, Span, Statement};
