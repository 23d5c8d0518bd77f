//! Handle Pool
//!
//! Owns a fixed-capacity set of physical slots and tracks which are
//! bound to a logical path and which are available.
//!
//! ## Responsibilities
//! - Acquire every slot in the backing store at startup (see `acquire.rs`)
//! - Create empty slots to grow capacity
//! - Bind/unbind paths through the header block
//! - Release all handles on teardown

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{PoolError, Result};
use crate::storage::{random_slot_name, AcquireError, SlotHandle, SlotStore};

use super::header::{self, Decoded, DiscardReason, HEADER_OFFSET_DATA, HEADER_SIZE};
use super::retry::RetryPolicy;

/// Index of a slot inside the pool
pub type SlotId = usize;

/// An acquired physical slot
pub(super) struct Slot {
    /// Opaque name in the backing store
    pub(super) name: String,
    /// Live exclusive handle
    pub(super) handle: Box<dyn SlotHandle>,
}

/// Pool of physical slots
///
/// ## Invariant
/// `bound.len() + available.len() == slots.len()` after every public
/// operation; a slot is in exactly one of the two views.
pub struct HandlePool {
    /// Backing store the slots come from
    pub(super) store: Box<dyn SlotStore>,

    /// Every acquired slot, indexed by `SlotId`
    pub(super) slots: Vec<Slot>,

    /// Logical path → slot
    pub(super) bound: HashMap<String, SlotId>,

    /// Slots free for allocation (lowest id allocated first)
    pub(super) available: BTreeSet<SlotId>,

    /// Whether handles are currently held
    pub(super) acquired: bool,
}

impl HandlePool {
    /// Create a pool over `store` without touching it
    pub fn new(store: Box<dyn SlotStore>) -> Self {
        Self {
            store,
            slots: Vec::new(),
            bound: HashMap::new(),
            available: BTreeSet::new(),
            acquired: false,
        }
    }

    /// Create and initialize a pool from config
    pub fn open(store: Box<dyn SlotStore>, config: &Config) -> Result<Self> {
        let mut pool = Self::new(store);
        let policy = Self::policy_from_config(config);
        pool.initialize(config.initial_capacity, config.clear_on_init, &policy)?;
        Ok(pool)
    }

    /// Acquisition policy derived from config (deadline starts now)
    pub fn policy_from_config(config: &Config) -> RetryPolicy {
        RetryPolicy::new(
            config.acquire_attempts,
            Duration::from_millis(config.acquire_backoff_ms),
        )
        .with_deadline(config.open_timeout().map(|t| Instant::now() + t))
    }

    /// Acquire all existing slots, then create `capacity` slots if none exist
    ///
    /// On startup:
    /// 1. Acquire every slot (retrying busy ones, force-deleting on the last attempt)
    /// 2. Wipe headers if `clear` is set, otherwise rediscover bindings
    /// 3. Create `capacity` empty slots if the store held none
    pub fn initialize(&mut self, capacity: usize, clear: bool, policy: &RetryPolicy) -> Result<()> {
        if self.acquired {
            self.release_all();
        }

        self.acquire_all(clear, policy)?;
        self.acquired = true;

        if self.capacity() == 0 {
            if let Err(e) = self.add_capacity(capacity) {
                self.release_all();
                return Err(e);
            }
        }

        tracing::info!(
            "Pool initialized: capacity={}, bound={}",
            self.capacity(),
            self.bound_count()
        );
        Ok(())
    }

    /// Create `n` empty slots; returns the new capacity
    pub fn add_capacity(&mut self, n: usize) -> Result<usize> {
        for _ in 0..n {
            let name = random_slot_name();
            let handle = self
                .store
                .create(&name)
                .map_err(|e| acquire_error(&name, e))?;

            let id = self.slots.len();
            self.slots.push(Slot {
                name: name.clone(),
                handle,
            });

            if let Err(e) = self.associate(id, "", 0) {
                self.available.remove(&id);
                self.slots.pop();
                if let Err(remove_err) = self.store.remove(&name) {
                    tracing::warn!("Failed to remove half-created slot {}: {}", name, remove_err);
                }
                return Err(e);
            }
        }

        if n > 0 {
            tracing::debug!("Added {} slot(s), capacity now {}", n, self.capacity());
        }
        Ok(self.capacity())
    }

    /// Grow capacity to at least `minimum`; returns the capacity
    pub fn reserve_minimum_capacity(&mut self, minimum: usize) -> Result<usize> {
        let current = self.capacity();
        if minimum > current {
            self.add_capacity(minimum - current)
        } else {
            Ok(current)
        }
    }

    /// Close every live handle; on-disk headers are left untouched
    pub fn release_all(&mut self) {
        let released = self.slots.len();
        self.slots.clear();
        self.bound.clear();
        self.available.clear();
        self.acquired = false;
        tracing::debug!("Released {} slot handle(s)", released);
    }

    // =========================================================================
    // Header association
    // =========================================================================

    /// Bind `slot` to `path` (or unbind it when `path` is empty)
    ///
    /// Writes and flushes the header block. Unbinding returns the slot to
    /// `available` and trims the data region; a failed trim is only logged.
    pub fn associate(&mut self, slot: SlotId, path: &str, flags: u32) -> Result<()> {
        if let Some(&owner) = self.bound.get(path) {
            if owner != slot {
                return Err(PoolError::InvalidPath(format!(
                    "{} is already bound to another slot",
                    path
                )));
            }
        }

        let block = header::encode_header(path, flags)?;
        let entry = self.slot_mut(slot)?;

        let written = entry.handle.write_at(&block, 0)?;
        if written != block.len() {
            return Err(PoolError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short header write on slot {}", entry.name),
            )));
        }
        entry.handle.flush()?;

        if path.is_empty() {
            if let Err(e) = entry.handle.truncate(HEADER_OFFSET_DATA) {
                tracing::warn!("Failed to trim unbound slot {}: {}", entry.name, e);
            }
            self.bound.retain(|_, owner| *owner != slot);
            self.available.insert(slot);
        } else {
            self.bound.retain(|_, owner| *owner != slot);
            self.bound.insert(path.to_string(), slot);
            self.available.remove(&slot);
        }

        Ok(())
    }

    /// Read the path stored in `slot`'s header
    ///
    /// Never fails: a stale, ephemeral, corrupt or unreadable header is
    /// dissociated and reported as no path.
    pub fn associated_path(&mut self, slot: SlotId) -> Option<String> {
        let (name, read) = {
            let entry = self.slots.get_mut(slot)?;
            let mut block = [0u8; HEADER_SIZE];
            let read = entry.handle.read_at(&mut block, 0).map(|n| block[..n].to_vec());
            (entry.name.clone(), read)
        };

        let block = match read {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!("Unreadable header on slot {}: {}", name, e);
                self.dissociate_quietly(slot);
                return None;
            }
        };

        match header::decode_header(&block) {
            Decoded::Bound(h) => Some(h.path),
            Decoded::Empty => {
                if let Some(entry) = self.slots.get_mut(slot) {
                    if let Err(e) = entry.handle.truncate(HEADER_OFFSET_DATA) {
                        tracing::warn!("Failed to trim unbound slot {}: {}", name, e);
                    }
                }
                None
            }
            Decoded::Discard(reason) => {
                match reason {
                    DiscardReason::Ephemeral { flags } => tracing::debug!(
                        "Discarding ephemeral file in slot {} (flags=0x{:x})",
                        name,
                        flags
                    ),
                    other => tracing::warn!("Corrupt header on slot {}: {:?}", name, other),
                }
                self.dissociate_quietly(slot);
                None
            }
        }
    }

    /// Unbind `path`; returns whether it was bound
    pub fn delete_path(&mut self, path: &str) -> Result<bool> {
        match self.bound.get(path).copied() {
            Some(slot) => {
                self.associate(slot, "", 0)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn dissociate_quietly(&mut self, slot: SlotId) {
        if let Err(e) = self.associate(slot, "", 0) {
            tracing::warn!("Failed to clear header of slot {}: {}", slot, e);
            // Keep the slot accounted for even if the header write failed
            self.bound.retain(|_, owner| *owner != slot);
            self.available.insert(slot);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots bound to a path
    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Number of free slots
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Bound paths, sorted
    pub fn bound_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.bound.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Whether handles are currently held
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Whether the bound/available views partition the slots
    pub fn is_consistent(&self) -> bool {
        self.bound.len() + self.available.len() == self.slots.len()
            && self.bound.values().all(|slot| !self.available.contains(slot))
    }

    /// Slot bound to `path`
    pub fn slot_for_path(&self, path: &str) -> Option<SlotId> {
        self.bound.get(path).copied()
    }

    /// Lowest-numbered free slot, left in place
    pub fn next_available(&self) -> Option<SlotId> {
        self.available.iter().next().copied()
    }

    /// Opaque name of a slot
    pub fn slot_name(&self, slot: SlotId) -> Option<&str> {
        self.slots.get(slot).map(|s| s.name.as_str())
    }

    /// Live handle of a slot
    pub fn handle(&self, slot: SlotId) -> Option<&dyn SlotHandle> {
        let entry = self.slots.get(slot)?;
        Some(entry.handle.as_ref())
    }

    /// Live handle of a slot (mutable)
    pub fn handle_mut(&mut self, slot: SlotId) -> Option<&mut dyn SlotHandle> {
        let entry = self.slots.get_mut(slot)?;
        Some(entry.handle.as_mut())
    }

    fn slot_mut(&mut self, slot: SlotId) -> Result<&mut Slot> {
        self.slots.get_mut(slot).ok_or(PoolError::NotInitialized)
    }
}

pub(super) fn acquire_error(name: &str, e: AcquireError) -> PoolError {
    match e {
        AcquireError::Busy => PoolError::HandleBusy(name.to_string()),
        AcquireError::Io(e) => PoolError::Io(e),
    }
}
