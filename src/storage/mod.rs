//! Storage Module
//!
//! Physical slots: pre-created storage objects with synchronous I/O over
//! their whole byte range, owned exclusively by whoever acquired them.
//!
//! ## Responsibilities
//! - Enumerate the slots present in a backing directory
//! - Create new slots under opaque random names
//! - Acquire exclusive handles (failing with `Busy` when held elsewhere)
//! - Remove slots (forced recovery of stuck handles)
//!
//! ## Backends
//! - [`FsStore`]: one file per slot, exclusivity through an advisory lock
//! - [`MemoryStore`]: shared in-process map, used by tests and ephemeral pools

mod fs;
mod memory;

use std::io;

use rand::distributions::Alphanumeric;
use rand::Rng;

pub use fs::{FsSlot, FsStore};
pub use memory::{MemorySlot, MemoryStore};

/// Length of generated slot names
pub const SLOT_NAME_LEN: usize = 16;

/// Synchronous I/O over one physical slot
///
/// Dropping the handle releases it.
pub trait SlotHandle: Send {
    /// Read up to `buf.len()` bytes at `offset`; returns the count read
    /// (smaller than `buf.len()` only at end of slot)
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write `buf` at `offset`; returns the count written
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize>;

    /// Flush buffered writes to durable storage
    fn flush(&mut self) -> io::Result<()>;

    /// Set the physical size to `size`
    fn truncate(&mut self, size: u64) -> io::Result<()>;

    /// Physical size in bytes
    fn size(&self) -> io::Result<u64>;
}

/// Why a handle could not be acquired
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// Another execution context holds the slot
    #[error("slot is held by another context")]
    Busy,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Directory of physical slots
pub trait SlotStore: Send {
    /// Names of every slot present
    fn list(&self) -> io::Result<Vec<String>>;

    /// Create a new empty slot and acquire it
    fn create(&mut self, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError>;

    /// Acquire an existing slot
    fn acquire(&mut self, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError>;

    /// Remove a slot from the backing store
    fn remove(&mut self, name: &str) -> io::Result<()>;
}

/// Generate an opaque slot name
pub fn random_slot_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SLOT_NAME_LEN)
        .map(char::from)
        .collect()
}
