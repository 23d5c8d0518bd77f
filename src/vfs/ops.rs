//! VFS Operation Layer
//!
//! The storage-engine-facing operation set, expressed over the handle
//! pool. Each open-file id is either absent (closed) or present and bound
//! to a slot; there is no intermediate state.

use crate::flags::{CREATE, DELETEONCLOSE};
use crate::pool::{HandlePool, HEADER_MAX_PATH_SIZE, HEADER_OFFSET_DATA};

use super::dirty::DirtyTracker;
use super::error::{ResultCode, VfsError, VfsResult};
use super::file_table::{FileId, FileTable, OpenFile};
use super::path::normalize_path;

/// Outcome of a successful read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Every requested byte was read
    Complete,

    /// Fewer bytes were available; the rest of the buffer is zero-filled
    Short { bytes_read: usize },
}

impl ReadOutcome {
    /// Result code reported to the engine
    pub fn code(&self) -> ResultCode {
        match self {
            ReadOutcome::Complete => ResultCode::Ok,
            ReadOutcome::Short { .. } => ResultCode::IoErrShortRead,
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, ReadOutcome::Short { .. })
    }
}

/// Virtual file system over a handle pool
pub struct Vfs {
    pool: HandlePool,
    files: FileTable,
    dirty: DirtyTracker,
}

impl Vfs {
    /// Wrap an initialized pool
    pub fn new(pool: HandlePool, page_size: usize) -> Self {
        Self {
            pool,
            files: FileTable::new(),
            dirty: DirtyTracker::new(page_size),
        }
    }

    pub fn pool(&self) -> &HandlePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut HandlePool {
        &mut self.pool
    }

    /// Number of open-file ids
    pub fn open_file_count(&self) -> usize {
        self.files.len()
    }

    /// Drop every open-file id and release all slot handles
    ///
    /// Dirty-page state is discarded with the handles.
    pub fn release(&mut self) {
        self.files.clear();
        self.dirty.clear();
        self.pool.release_all();
    }

    // =========================================================================
    // File operations
    // =========================================================================

    /// Open `name`, binding a free slot when `CREATE` is set
    pub fn open(&mut self, name: &str, flags: u32) -> VfsResult<FileId> {
        let path = Self::normalize(name)?;

        let slot = match self.pool.slot_for_path(&path) {
            Some(slot) => slot,
            None if flags & CREATE != 0 => {
                let capacity = self.pool.capacity();
                if self.pool.bound_count() >= capacity {
                    tracing::warn!("Cannot create {}: all {} slots in use", path, capacity);
                    return Err(VfsError::PoolExhausted { capacity });
                }
                let slot = self
                    .pool
                    .next_available()
                    .ok_or(VfsError::PoolExhausted { capacity })?;
                self.pool
                    .associate(slot, &path, flags)
                    .map_err(|e| VfsError::io(ResultCode::CantOpen, e))?;
                tracing::debug!("Bound {} to slot {}", path, slot);
                slot
            }
            None => {
                tracing::debug!("Open of missing file {} without CREATE", path);
                return Err(VfsError::NotFound(path));
            }
        };

        let id = self.files.insert(OpenFile { path, slot, flags });
        tracing::trace!("Opened {} (slot {})", id, slot);
        Ok(id)
    }

    /// Read `buf.len()` bytes at logical `offset`
    pub fn read(&mut self, id: FileId, buf: &mut [u8], offset: u64) -> VfsResult<ReadOutcome> {
        let file = self.files.get(id).ok_or(VfsError::UnknownFile(id))?;
        let handle = self
            .pool
            .handle_mut(file.slot)
            .ok_or(VfsError::UnknownFile(id))?;

        let n = handle
            .read_at(buf, HEADER_OFFSET_DATA + offset)
            .map_err(|e| VfsError::io(ResultCode::IoErrRead, e))?;

        if n < buf.len() {
            buf[n..].fill(0);
            return Ok(ReadOutcome::Short { bytes_read: n });
        }
        Ok(ReadOutcome::Complete)
    }

    /// Write all of `buf` at logical `offset`; partial writes are errors
    pub fn write(&mut self, id: FileId, buf: &[u8], offset: u64) -> VfsResult<()> {
        let file = self.files.get(id).ok_or(VfsError::UnknownFile(id))?;
        let handle = self
            .pool
            .handle_mut(file.slot)
            .ok_or(VfsError::UnknownFile(id))?;

        let n = handle
            .write_at(buf, HEADER_OFFSET_DATA + offset)
            .map_err(|e| VfsError::io(ResultCode::IoErrWrite, e))?;
        if n != buf.len() {
            return Err(VfsError::io(
                ResultCode::IoErrWrite,
                format!("wrote {} of {} bytes", n, buf.len()),
            ));
        }

        self.dirty.mark(&file.path, offset, buf.len());
        Ok(())
    }

    /// Flush the slot behind `id`
    pub fn sync(&mut self, id: FileId) -> VfsResult<()> {
        let file = self.files.get(id).ok_or(VfsError::UnknownFile(id))?;
        self.pool
            .handle_mut(file.slot)
            .ok_or(VfsError::UnknownFile(id))?
            .flush()
            .map_err(|e| VfsError::io(ResultCode::IoErrFsync, e))
    }

    /// Set the logical size to `size`
    pub fn truncate(&mut self, id: FileId, size: u64) -> VfsResult<()> {
        let file = self.files.get(id).ok_or(VfsError::UnknownFile(id))?;
        self.pool
            .handle_mut(file.slot)
            .ok_or(VfsError::UnknownFile(id))?
            .truncate(HEADER_OFFSET_DATA + size)
            .map_err(|e| VfsError::io(ResultCode::IoErrTruncate, e))?;

        self.dirty.mark(&file.path, size, 1);
        Ok(())
    }

    /// Logical size in bytes
    pub fn file_size(&self, id: FileId) -> VfsResult<u64> {
        let file = self.files.get(id).ok_or(VfsError::UnknownFile(id))?;
        let size = self
            .pool
            .handle(file.slot)
            .ok_or(VfsError::UnknownFile(id))?
            .size()
            .map_err(|e| VfsError::io(ResultCode::IoErrFstat, e))?;
        Ok(size.saturating_sub(HEADER_OFFSET_DATA))
    }

    /// Forget `id`; the slot stays bound to its path
    ///
    /// Files opened with `DELETEONCLOSE` are deleted.
    pub fn close(&mut self, id: FileId) -> VfsResult<()> {
        let file = self.files.remove(id).ok_or(VfsError::UnknownFile(id))?;
        if file.flags & DELETEONCLOSE != 0 {
            self.delete(&file.path)?;
        }
        tracing::trace!("Closed {}", id);
        Ok(())
    }

    /// Whether `name` is bound
    pub fn access(&self, name: &str) -> bool {
        normalize_path(name)
            .map(|path| self.pool.slot_for_path(&path).is_some())
            .unwrap_or(false)
    }

    /// Unbind `name` and free its slot; no-op if it is not bound
    ///
    /// Open ids for the path become unknown.
    pub fn delete(&mut self, name: &str) -> VfsResult<()> {
        let Some(path) = normalize_path(name) else {
            return Ok(());
        };

        let deleted = self
            .pool
            .delete_path(&path)
            .map_err(|e| VfsError::io(ResultCode::IoErrDelete, e))?;
        if deleted {
            let stale = self.files.remove_path(&path);
            if stale > 0 {
                tracing::debug!("Deleted {} with {} open id(s)", path, stale);
            }
            self.dirty.forget(&path);
            tracing::debug!("Deleted {}", path);
        }
        Ok(())
    }

    // =========================================================================
    // Dirty pages
    // =========================================================================

    /// Pages of `name` written or truncated since the last reset
    pub fn dirty_pages(&self, name: &str) -> Vec<u32> {
        normalize_path(name)
            .map(|path| self.dirty.dirty_pages(&path))
            .unwrap_or_default()
    }

    /// Mark every page of `name` clean
    pub fn reset_dirty(&mut self, name: &str) {
        if let Some(path) = normalize_path(name) {
            self.dirty.reset(&path);
        }
    }

    pub fn page_size(&self) -> usize {
        self.dirty.page_size()
    }

    fn normalize(name: &str) -> VfsResult<String> {
        let path = normalize_path(name).ok_or_else(|| VfsError::InvalidPath(name.to_string()))?;
        if path.len() > HEADER_MAX_PATH_SIZE {
            return Err(VfsError::InvalidPath(path));
        }
        Ok(path)
    }
}
