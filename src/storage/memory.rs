//! In-memory slot store
//!
//! Clones of a [`MemoryStore`] share the same slots, which lets a test
//! stand up two "contexts" over one backing store: a slot acquired
//! through one clone is busy for every other acquirer until the handle
//! is dropped.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AcquireError, SlotHandle, SlotStore};

type SlotData = Arc<Mutex<Vec<u8>>>;

#[derive(Default)]
struct Shared {
    slots: HashMap<String, SlotData>,
    held: HashSet<String>,
}

/// Shared in-process slot store
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots present
    pub fn slot_count(&self) -> usize {
        self.shared.lock().slots.len()
    }

    /// Whether a slot is currently held by some handle
    pub fn is_held(&self, name: &str) -> bool {
        self.shared.lock().held.contains(name)
    }

    /// Copy of a slot's raw bytes (header included)
    pub fn raw_bytes(&self, name: &str) -> Option<Vec<u8>> {
        let shared = self.shared.lock();
        shared.slots.get(name).map(|data| data.lock().clone())
    }

    /// Overwrite raw bytes of a slot, bypassing any handle
    pub fn patch_raw(&self, name: &str, offset: usize, bytes: &[u8]) -> bool {
        let shared = self.shared.lock();
        match shared.slots.get(name) {
            Some(data) => {
                let mut data = data.lock();
                if data.len() < offset + bytes.len() {
                    data.resize(offset + bytes.len(), 0);
                }
                data[offset..offset + bytes.len()].copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    fn take(&self, name: &str, data: SlotData, shared: &mut Shared) -> Box<dyn SlotHandle> {
        shared.held.insert(name.to_string());
        Box::new(MemorySlot {
            name: name.to_string(),
            data,
            store: Arc::clone(&self.shared),
        })
    }
}

impl SlotStore for MemoryStore {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = self.shared.lock().slots.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn create(&mut self, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError> {
        let mut shared = self.shared.lock();
        if shared.slots.contains_key(name) {
            return Err(AcquireError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("slot {} already exists", name),
            )));
        }

        let data: SlotData = Arc::new(Mutex::new(Vec::new()));
        shared.slots.insert(name.to_string(), Arc::clone(&data));
        Ok(self.take(name, data, &mut shared))
    }

    fn acquire(&mut self, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError> {
        let mut shared = self.shared.lock();
        let data = match shared.slots.get(name) {
            Some(data) => Arc::clone(data),
            None => {
                return Err(AcquireError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("slot {} not found", name),
                )))
            }
        };

        if shared.held.contains(name) {
            return Err(AcquireError::Busy);
        }

        Ok(self.take(name, data, &mut shared))
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        let mut shared = self.shared.lock();
        shared.slots.remove(name);
        shared.held.remove(name);
        Ok(())
    }
}

/// An acquired in-memory slot
pub struct MemorySlot {
    name: String,
    data: SlotData,
    store: Arc<Mutex<Shared>>,
}

impl SlotHandle for MemorySlot {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let data = self.data.lock();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }

        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let mut data = self.data.lock();
        let end = usize::try_from(offset)
            .ok()
            .and_then(|offset| offset.checked_add(buf.len()))
            .ok_or_else(|| out_of_memory(offset, buf.len()))?;
        grow(&mut data, end)?;

        let offset = end - buf.len();
        data[offset..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
        let mut data = self.data.lock();
        let size = usize::try_from(size).map_err(|_| out_of_memory(size, 0))?;
        grow(&mut data, size)?;
        data.truncate(size);
        Ok(())
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.data.lock().len() as u64)
    }
}

/// Zero-extend `data` to at least `len` bytes without aborting on OOM
fn grow(data: &mut Vec<u8>, len: usize) -> io::Result<()> {
    if len > data.len() {
        data.try_reserve_exact(len - data.len())
            .map_err(|_| out_of_memory(len as u64, 0))?;
        data.resize(len, 0);
    }
    Ok(())
}

fn out_of_memory(offset: u64, len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::OutOfMemory,
        format!("cannot grow slot to {} + {} bytes", offset, len),
    )
}

impl Drop for MemorySlot {
    fn drop(&mut self) {
        let mut shared = self.store.lock();
        // A removed-and-recreated slot may be held by a newer handle
        let still_ours = shared
            .slots
            .get(&self.name)
            .map(|data| Arc::ptr_eq(data, &self.data))
            .unwrap_or(false);
        if still_ours {
            shared.held.remove(&self.name);
        }
    }
}
