//! VFS error vocabulary
//!
//! The SQL engine above the VFS understands a small fixed set of result
//! codes. Every failure crossing the VFS boundary carries one of them.

use std::fmt;

use thiserror::Error;

use super::FileId;

/// Result type for VFS operations
pub type VfsResult<T> = std::result::Result<T, VfsError>;

/// SQLite result codes produced by the VFS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,
    Error = 1,
    IoErr = 10,
    CantOpen = 14,
    IoErrRead = 10 | (1 << 8),
    IoErrShortRead = 10 | (2 << 8),
    IoErrWrite = 10 | (3 << 8),
    IoErrFsync = 10 | (4 << 8),
    IoErrTruncate = 10 | (6 << 8),
    IoErrFstat = 10 | (7 << 8),
    IoErrDelete = 10 | (10 << 8),
    IoErrAccess = 10 | (13 << 8),
}

impl ResultCode {
    /// Numeric code as seen by the engine
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Failure of a VFS operation
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path is not bound and creation was not requested
    #[error("File not found: {0}")]
    NotFound(String),

    /// Creation requested but every slot is bound
    #[error("Pool exhausted: all {capacity} slots are in use")]
    PoolExhausted { capacity: usize },

    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("Unknown file id: {0}")]
    UnknownFile(FileId),

    /// Storage primitive failed
    #[error("{code}: {message}")]
    Io { code: ResultCode, message: String },
}

impl VfsError {
    /// Wrap any storage failure under `code`
    pub fn io(code: ResultCode, err: impl fmt::Display) -> Self {
        VfsError::Io {
            code,
            message: err.to_string(),
        }
    }

    /// Result code reported to the engine
    pub fn code(&self) -> ResultCode {
        match self {
            VfsError::NotFound(_) | VfsError::PoolExhausted { .. } | VfsError::InvalidPath(_) => {
                ResultCode::CantOpen
            }
            VfsError::UnknownFile(_) => ResultCode::IoErr,
            VfsError::Io { code, .. } => *code,
        }
    }
}
