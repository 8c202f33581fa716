//! Amendment pipeline errors.

use crate::config::UsageError;
use crate::pipeline::PipelineState;
use sepolicy_core::BufferError;
use sepolicy_db::CodecError;
use std::path::PathBuf;

/// Boxed error from a module compiler implementation
pub type CompilerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure classes, each with its own exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed invocation
    Usage,
    /// Open/stat/read/write failure
    Io,
    /// Zero-length base policy
    EmptyInput,
    /// Codec rejected the base policy
    Decode,
    /// An incremental module could not be read or parsed
    ModuleRead,
    /// Compiler rejected the module set
    Compile,
    /// Merge into the base failed
    Amend,
    /// Codec could not serialize the result
    Encode,
}

impl ErrorKind {
    /// Process exit status for this failure class
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Usage => 1,
            Self::Io => 2,
            Self::EmptyInput => 3,
            Self::Decode => 4,
            Self::ModuleRead => 5,
            Self::Compile => 6,
            Self::Amend => 7,
            Self::Encode => 8,
        }
    }
}

/// Amendment pipeline error
#[derive(Debug, thiserror::Error)]
pub enum AmendError {
    /// Malformed invocation
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Base policy could not be read
    #[error("Could not read base binary policy: {0}")]
    BaseRead(#[source] BufferError),

    /// Base policy is empty
    #[error("No binary size: {} is empty.", path.display())]
    EmptyInput { path: PathBuf },

    /// Codec rejected the base policy
    #[error("Failed to read binary policy: {code}: {source}")]
    Decode {
        code: i32,
        #[source]
        source: CodecError,
    },

    /// An incremental module could not be read or parsed
    #[error("Failure adding {} to parse tree: {source}", path.display())]
    ModuleRead {
        path: PathBuf,
        #[source]
        source: CompilerError,
    },

    /// Compiler rejected the module set
    #[error("Failed to compile module set: {0}")]
    Compile(#[source] CompilerError),

    /// Merge into the base failed
    #[error("Failed to amend policy database: {0}")]
    Amend(#[source] CompilerError),

    /// Codec could not serialize the result
    #[error("Failed to write binary policy: {code}: {source}")]
    Encode {
        code: i32,
        #[source]
        source: CodecError,
    },

    /// Output could not be created or written
    #[error("Failure opening binary {} file for writing: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AmendError {
    /// Failure class
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) => ErrorKind::Usage,
            Self::BaseRead(_) | Self::Write { .. } => ErrorKind::Io,
            Self::EmptyInput { .. } => ErrorKind::EmptyInput,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::ModuleRead { .. } => ErrorKind::ModuleRead,
            Self::Compile(_) => ErrorKind::Compile,
            Self::Amend(_) => ErrorKind::Amend,
            Self::Encode { .. } => ErrorKind::Encode,
        }
    }

    /// Last state the pipeline reached before failing
    #[must_use]
    pub const fn reached(&self) -> PipelineState {
        match self {
            Self::Usage(_) | Self::BaseRead(_) | Self::EmptyInput { .. } | Self::Decode { .. } => {
                PipelineState::Idle
            }
            Self::ModuleRead { .. } => PipelineState::BaseLoaded,
            Self::Compile(_) => PipelineState::ModulesRead,
            Self::Amend(_) => PipelineState::Compiled,
            Self::Encode { .. } | Self::Write { .. } => PipelineState::Amended,
        }
    }

    /// Process exit status
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }

    pub(crate) fn decode(source: CodecError) -> Self {
        Self::Decode {
            code: source.code(),
            source,
        }
    }

    pub(crate) fn encode(source: CodecError) -> Self {
        Self::Encode {
            code: source.code(),
            source,
        }
    }
}
