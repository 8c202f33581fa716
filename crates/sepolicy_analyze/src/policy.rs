//! Loading a binary policy for analysis.

use sepolicy_core::{BufferError, ByteBuffer};
use sepolicy_db::{CodecError, PolicyCodec, PolicyDatabase};
use std::path::{Path, PathBuf};

/// Policy loading errors
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// File could not be read
    #[error(transparent)]
    Read(#[from] BufferError),

    /// File is empty
    #[error("{} is empty", path.display())]
    Empty { path: PathBuf },

    /// Codec rejected the file
    #[error("Failed to read binary policy {}: {code}: {source}", path.display())]
    Decode {
        path: PathBuf,
        code: i32,
        #[source]
        source: CodecError,
    },
}

/// Read and decode a binary policy
///
/// # Errors
///
/// Returns error if the file cannot be read, is empty, or does not decode
pub fn load_policy(path: &Path, codec: &impl PolicyCodec) -> Result<PolicyDatabase, LoadError> {
    let buffer = ByteBuffer::load(path)?;
    if buffer.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    codec
        .decode(buffer.as_bytes())
        .map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            code: source.code(),
            source,
        })
}
