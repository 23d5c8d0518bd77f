//! VFS Module
//!
//! File-system semantics for the SQL engine over the handle pool.
//!
//! ## Responsibilities
//! - open/read/write/sync/truncate/size/close/access/delete
//! - Map logical offsets past the header sector
//! - Translate every failure into the engine's I/O result codes
//! - Track dirty pages and provide bulk import/export helpers
//!
//! ## File lifecycle
//! ```text
//!   Closed ──open──▶ Open ──close──▶ Closed
//!                     │
//!        (slot stays bound to the path until delete)
//! ```

mod bulk;
mod dirty;
mod error;
mod file_table;
mod ops;
mod path;

pub use bulk::{DirtyPage, PersistStats, SQLITE_HEADER};
pub use dirty::DirtyTracker;
pub use error::{ResultCode, VfsError, VfsResult};
pub use file_table::{FileId, FileTable, OpenFile};
pub use ops::{ReadOutcome, Vfs};
pub use path::normalize_path;
