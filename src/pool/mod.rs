//! Pool Module
//!
//! Fixed set of physical slots plus the header block that records which
//! logical path each slot represents.
//!
//! ## Slot Layout
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header sector (4096)                   │
//! │ ┌──────────┬──────────┬──────────────┐ │
//! │ │Path (512)│Flags (4) │ Digest (8)   │ │
//! │ └──────────┴──────────┴──────────────┘ │
//! ├────────────────────────────────────────┤
//! │ Data region                            │
//! │   logical offset o → physical 4096 + o │
//! └────────────────────────────────────────┘
//! ```
//!
//! ## Pool State
//! - `bound`: path → slot (rediscovered from headers on startup)
//! - `available`: slots free for allocation
//! - capacity = bound + available, and only ever grows

pub mod header;
pub mod retry;
mod handle_pool;
mod acquire;

pub use handle_pool::{HandlePool, SlotId};
pub use header::{
    compute_digest, decode_header, encode_header, Decoded, DiscardReason, Header,
    HEADER_MAX_PATH_SIZE, HEADER_OFFSET_DATA, HEADER_SIZE, SECTOR_SIZE,
};
pub use retry::{retry, Attempt, Backoff, RetryError, RetryPolicy};

/// Name of the subdirectory holding the opaque slot files
pub const OPAQUE_DIR_NAME: &str = ".opaque";
