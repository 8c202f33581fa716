//! seamend Policy Database
//!
//! The decoded form of a compiled policy (type table plus the two
//! transposed type/attribute bitmap matrices) and the canonical binary
//! codec that reads and writes it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod policydb;

pub use codec::{BinaryPolicyCodec, CodecError, PolicyCodec, FORMAT_VERSION, POLICY_MAGIC};
pub use policydb::{PolicyDatabase, TypeDatum, TypeFlavor, DEFAULT_POLICY_VERSION};
