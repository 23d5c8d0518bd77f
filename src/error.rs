//! Error types for poolvfs
//!
//! Provides a unified error type for pool, protocol and configuration
//! operations. The VFS operation layer has its own narrower error type,
//! [`VfsError`], which always maps onto a fixed I/O result code.

use thiserror::Error;

use crate::vfs::VfsError;

/// Result type alias using PoolError
pub type Result<T> = std::result::Result<T, PoolError>;

/// Unified error type for poolvfs operations
#[derive(Debug, Error)]
pub enum PoolError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Pool Errors
    // -------------------------------------------------------------------------
    #[error("No storage handles could be acquired ({found} slots present)")]
    NoHandlesAcquired { found: usize },

    #[error("Timed out acquiring storage handles after {attempts} attempt(s)")]
    AcquireTimeout { attempts: u32 },

    #[error("Storage handle busy: {0}")]
    HandleBusy(String),

    #[error("Pool is not initialized")]
    NotInitialized,

    // -------------------------------------------------------------------------
    // Path Errors
    // -------------------------------------------------------------------------
    #[error("Path too long: {len} bytes (max {max})")]
    PathTooLong { len: usize, max: usize },

    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("Invalid database image: {0}")]
    InvalidDatabase(String),

    // -------------------------------------------------------------------------
    // VFS Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Vfs(#[from] VfsError),

    // -------------------------------------------------------------------------
    // Serialization / Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Worker Errors
    // -------------------------------------------------------------------------
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<serde_json::Error> for PoolError {
    fn from(e: serde_json::Error) -> Self {
        PoolError::Serialization(e.to_string())
    }
}
