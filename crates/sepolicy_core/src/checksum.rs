//! Content checksums for binary policy images.
//!
//! Uses BLAKE3 for all hashing operations.

use std::fmt;

/// A BLAKE3 checksum (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// The number of bytes in a checksum
    pub const LEN: usize = 32;

    /// Compute the checksum of data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from a slice, which must be exactly [`Checksum::LEN`] bytes
    ///
    /// # Errors
    ///
    /// Returns error if the slice has the wrong length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ChecksumError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ChecksumError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if the checksum matches data
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

/// Checksum-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// Invalid length (not 32 bytes)
    InvalidLength(usize),
}

impl std::error::Error for ChecksumError {}

impl fmt::Display for ChecksumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength(len) => {
                write!(f, "Invalid checksum length: {} (expected 32)", len)
            }
        }
    }
}
