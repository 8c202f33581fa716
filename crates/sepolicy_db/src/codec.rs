//! Canonical binary policy codec.
//!
//! Uses postcard for byte-stable encoding of the database body, framed by
//! a magic, a format version, the body length and a BLAKE3 checksum:
//!
//! ```text
//! "SEPOLBIN" | version: u32 BE | len: u32 BE | body[len] | blake3(body)
//! ```

use crate::policydb::PolicyDatabase;
use sepolicy_core::Checksum;
use std::io::Write;

/// File magic of a binary policy image
pub const POLICY_MAGIC: &[u8; 8] = b"SEPOLBIN";

/// Current image format version
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = POLICY_MAGIC.len() + 4 + 4;

/// Reads and writes binary policy images
pub trait PolicyCodec {
    /// Decode an image into a database
    ///
    /// # Errors
    ///
    /// Returns error if the image is malformed or inconsistent
    fn decode(&self, bytes: &[u8]) -> Result<PolicyDatabase, CodecError>;

    /// Encode a database into `writer`
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be serialized or written
    fn encode(&self, db: &PolicyDatabase, writer: &mut dyn Write) -> Result<(), CodecError>;

    /// Encode a database into a fresh buffer
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be serialized
    fn encode_to_vec(&self, db: &PolicyDatabase) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.encode(db, &mut out)?;
        Ok(out)
    }
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Image does not start with the policy magic
    #[error("Not a binary policy image")]
    BadMagic,

    /// Image format version is not understood
    #[error("Unsupported image format version {0}")]
    UnsupportedVersion(u32),

    /// Image is shorter than its header claims
    #[error("Truncated image: {actual} bytes, expected {expected}")]
    Truncated { expected: usize, actual: usize },

    /// Body does not match its checksum
    #[error("Checksum mismatch")]
    ChecksumMismatch,

    /// Body cannot be (de)serialized
    #[error("Malformed policy body: {0}")]
    Malformed(String),

    /// Database violates a structural invariant
    #[error("Inconsistent policy: {0}")]
    Inconsistent(String),

    /// Writing the image failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl CodecError {
    /// Stable numeric status code
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::BadMagic => -1,
            Self::UnsupportedVersion(_) => -2,
            Self::Truncated { .. } => -3,
            Self::ChecksumMismatch => -4,
            Self::Malformed(_) => -5,
            Self::Inconsistent(_) => -6,
            Self::Io(_) => -7,
        }
    }
}

/// Codec for the framed postcard image format
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryPolicyCodec;

impl BinaryPolicyCodec {
    /// Create a new codec
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PolicyCodec for BinaryPolicyCodec {
    fn decode(&self, bytes: &[u8]) -> Result<PolicyDatabase, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if &bytes[..POLICY_MAGIC.len()] != POLICY_MAGIC {
            return Err(CodecError::BadMagic);
        }

        let version = read_u32(&bytes[8..12]);
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let body_len = read_u32(&bytes[12..16]) as usize;
        let expected = HEADER_LEN + body_len + Checksum::LEN;
        if bytes.len() < expected {
            return Err(CodecError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(CodecError::Malformed(format!(
                "{} trailing bytes",
                bytes.len() - expected
            )));
        }

        let body = &bytes[HEADER_LEN..HEADER_LEN + body_len];
        let checksum = Checksum::from_slice(&bytes[HEADER_LEN + body_len..])
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        if !checksum.verify(body) {
            return Err(CodecError::ChecksumMismatch);
        }

        let db: PolicyDatabase =
            postcard::from_bytes(body).map_err(|e| CodecError::Malformed(e.to_string()))?;
        db.validate()
            .map_err(|e| CodecError::Inconsistent(e.to_string()))?;

        tracing::debug!(
            version = db.version(),
            types = db.type_count(),
            "decoded binary policy"
        );
        Ok(db)
    }

    fn encode(&self, db: &PolicyDatabase, writer: &mut dyn Write) -> Result<(), CodecError> {
        db.validate()
            .map_err(|e| CodecError::Inconsistent(e.to_string()))?;

        let body = postcard::to_allocvec(db).map_err(|e| CodecError::Malformed(e.to_string()))?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| CodecError::Malformed(format!("body of {} bytes", body.len())))?;
        let checksum = Checksum::compute(&body);

        let io = |e: std::io::Error| CodecError::Io(e.to_string());
        writer.write_all(POLICY_MAGIC).map_err(io)?;
        writer.write_all(&FORMAT_VERSION.to_be_bytes()).map_err(io)?;
        writer.write_all(&body_len.to_be_bytes()).map_err(io)?;
        writer.write_all(&body).map_err(io)?;
        writer.write_all(checksum.as_bytes()).map_err(io)?;

        tracing::debug!(
            types = db.type_count(),
            bytes = HEADER_LEN + body.len() + Checksum::LEN,
            "encoded binary policy"
        );
        Ok(())
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    u32::from_be_bytes(word)
}
