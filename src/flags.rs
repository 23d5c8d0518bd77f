//! SQLite open flags
//!
//! The subset of `SQLITE_OPEN_*` bits the pool inspects. Values match the
//! engine's C API so headers written by one build are readable by another.

pub const READONLY: u32 = 0x0000_0001;
pub const READWRITE: u32 = 0x0000_0002;
pub const CREATE: u32 = 0x0000_0004;
pub const DELETEONCLOSE: u32 = 0x0000_0008;
pub const EXCLUSIVE: u32 = 0x0000_0010;
/// Marks a header whose digest must be verified
pub const MEMORY: u32 = 0x0000_0080;
pub const MAIN_DB: u32 = 0x0000_0100;
pub const TEMP_DB: u32 = 0x0000_0200;
pub const TRANSIENT_DB: u32 = 0x0000_0400;
pub const MAIN_JOURNAL: u32 = 0x0000_0800;
pub const TEMP_JOURNAL: u32 = 0x0000_1000;
pub const SUBJOURNAL: u32 = 0x0000_2000;
pub const SUPER_JOURNAL: u32 = 0x0000_4000;
pub const WAL: u32 = 0x0008_0000;

/// Bit recorded in a header when its digest was computed
pub const COMPUTE_DIGEST: u32 = MEMORY;

/// File categories that survive a restart
pub const PERSISTENT_FILE_TYPES: u32 = MAIN_DB | MAIN_JOURNAL | SUPER_JOURNAL | WAL;

/// Flags used by the bulk file operations
pub const MAIN_DB_CREATE: u32 = READWRITE | CREATE | MAIN_DB;

/// Whether a header with these flags describes a file that must not
/// be carried across a restart
pub fn is_ephemeral(flags: u32) -> bool {
    flags & DELETEONCLOSE != 0 || flags & PERSISTENT_FILE_TYPES == 0
}
