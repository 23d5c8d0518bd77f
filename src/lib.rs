//! # poolvfs
//!
//! A pooled virtual file system giving an embedded SQL engine durable,
//! page-addressable storage on top of a fixed pool of exclusive storage
//! handles:
//! - Slot identity recorded in a digest-checked header block
//! - Crash-tolerant rediscovery of path bindings on startup
//! - Retry and forced recovery of slots held by another process
//! - Request/response worker protocol with a TCP transport
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Caller (TCP client / WorkerHandle)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  {id, operation, args}
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Request Dispatcher                        │
//! │              (single thread, receipt order)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  VFS Operation Layer                        │
//! │      (open-file table, dirty pages, bulk helpers)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Handle Pool                            │
//! │          (bound map, available set, header codec)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   FsStore   │          │ MemoryStore │
//!   │ (fs2 locks) │          │  (shared)   │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod flags;

pub mod storage;
pub mod pool;
pub mod vfs;
pub mod protocol;
pub mod dispatcher;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PoolError, Result};
pub use config::Config;
pub use dispatcher::{Dispatcher, LogLevel, Worker, WorkerHandle};
pub use pool::HandlePool;
pub use vfs::{FileId, ReadOutcome, ResultCode, Vfs, VfsError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of poolvfs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
