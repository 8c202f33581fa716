//! seamend Core Types
//!
//! Shared building blocks for the policy tools: owned byte buffers loaded
//! from disk, the extensible bitmap used by the type/attribute matrices,
//! and content checksums.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod checksum;
pub mod ebitmap;
pub mod error;

// Re-exports
pub use buffer::{BufferError, ByteBuffer};
pub use checksum::{Checksum, ChecksumError};
pub use ebitmap::{Ebitmap, EbitmapNode, MAPSIZE};
pub use error::{CoreError, CoreResult};
