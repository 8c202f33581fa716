//! Whole-file byte buffers.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Contents of a file read fully into memory, tagged with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    /// Path the bytes were read from
    path: PathBuf,
    /// File contents
    data: Vec<u8>,
}

impl ByteBuffer {
    /// Read a file fully
    ///
    /// The file is stat'd once and exactly that many bytes are read.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened, stat'd, or is shorter
    /// than its reported size
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BufferError> {
        let path = path.as_ref();

        let mut file = File::open(path).map_err(|source| BufferError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let size = file
            .metadata()
            .map_err(|source| BufferError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        let size = usize::try_from(size).map_err(|_| BufferError::Stat {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, "file too large"),
        })?;

        let mut data = vec![0u8; size];
        file.read_exact(&mut data)
            .map_err(|source| BufferError::ShortRead {
                path: path.to_path_buf(),
                expected: size,
                source,
            })?;

        tracing::trace!(path = %path.display(), size, "loaded file");

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    /// Path the bytes were read from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get data slice
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Errors raised while loading a file
#[derive(Debug)]
pub enum BufferError {
    /// The file could not be opened
    Open { path: PathBuf, source: io::Error },
    /// The file size could not be determined
    Stat { path: PathBuf, source: io::Error },
    /// Fewer bytes than the reported size could be read
    ShortRead {
        path: PathBuf,
        expected: usize,
        source: io::Error,
    },
}

impl BufferError {
    /// Path of the file that failed
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. } | Self::Stat { path, .. } | Self::ShortRead { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Could not open file: {}: {}", path.display(), source)
            }
            Self::Stat { path, source } => {
                write!(f, "Could not stat file: {}: {}", path.display(), source)
            }
            Self::ShortRead {
                path,
                expected,
                source,
            } => write!(
                f,
                "Failure reading file: {} ({} bytes expected): {}",
                path.display(),
                expected,
                source
            ),
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Stat { source, .. } | Self::ShortRead { source, .. } => {
                Some(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_reads_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"(type domain_a)\n").unwrap();
        file.flush().unwrap();

        let buffer = ByteBuffer::load(file.path()).unwrap();
        assert_eq!(buffer.as_bytes(), b"(type domain_a)\n");
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.path(), file.path());
    }

    #[test]
    fn test_load_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let buffer = ByteBuffer::load(file.path()).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.cil");

        let err = ByteBuffer::load(&missing).unwrap_err();
        assert!(matches!(err, BufferError::Open { .. }));
        assert_eq!(err.path(), missing.as_path());
        assert!(err.to_string().contains("Could not open file"));
    }
}
