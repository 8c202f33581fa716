//! seamend Policy Analysis
//!
//! Read-only inspection of a compiled binary policy. The `attribute`
//! query walks the type/attribute bitmaps in either direction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod cli;
pub mod policy;

pub use attribute::{list_attribute, AttributeArgs, Direction, QueryError, ATTRIBUTE_USAGE};
pub use cli::{execute, AnalyzeError, Cli, Commands};
pub use policy::{load_policy, LoadError};
