//! Bulk file operations
//!
//! Whole-file import/export and dirty-page persistence, built from the
//! raw VFS operations. Every helper closes the ids it opens, whether or
//! not the body succeeded.

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};
use crate::flags::{MAIN_DB, MAIN_DB_CREATE, READWRITE};

use super::error::{ResultCode, VfsError, VfsResult};
use super::file_table::FileId;
use super::ops::Vfs;

/// Magic string at the start of every SQLite database image
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// One page to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirtyPage {
    pub page_number: u32,
    pub data: Vec<u8>,
}

/// Outcome of a dirty-page persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersistStats {
    pub pages_written: usize,
    pub bytes_written: usize,
}

fn page_offset(page: &DirtyPage, page_size: usize) -> VfsResult<u64> {
    if page_size == 0 || page.data.len() > page_size {
        return Err(VfsError::io(
            ResultCode::IoErrWrite,
            format!(
                "page {} has {} bytes (page size {})",
                page.page_number,
                page.data.len(),
                page_size
            ),
        ));
    }

    u64::from(page.page_number)
        .checked_mul(page_size as u64)
        .ok_or_else(|| {
            VfsError::io(
                ResultCode::IoErrWrite,
                format!("page {} is out of range", page.page_number),
            )
        })
}

impl Vfs {
    /// Run `body` against a freshly opened id, closing it afterwards
    fn with_open<T>(
        &mut self,
        name: &str,
        flags: u32,
        body: impl FnOnce(&mut Self, FileId) -> VfsResult<T>,
    ) -> VfsResult<T> {
        let id = self.open(name, flags)?;
        let result = body(self, id);
        let closed = self.close(id);
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Entire contents of `name`; empty if it does not exist
    pub fn read_file(&mut self, name: &str) -> VfsResult<Vec<u8>> {
        if !self.access(name) {
            return Ok(Vec::new());
        }

        self.with_open(name, READWRITE | MAIN_DB, |vfs, id| {
            let size = vfs.file_size(id)? as usize;
            let mut data = vec![0u8; size];
            if size > 0 {
                let outcome = vfs.read(id, &mut data, 0)?;
                if let super::ReadOutcome::Short { bytes_read } = outcome {
                    data.truncate(bytes_read);
                }
            }
            Ok(data)
        })
    }

    /// Replace the contents of `name`, creating it if needed
    pub fn write_file(&mut self, name: &str, data: &[u8]) -> VfsResult<usize> {
        self.with_open(name, MAIN_DB_CREATE, |vfs, id| {
            if !data.is_empty() {
                vfs.write(id, data, 0)?;
            }
            vfs.truncate(id, data.len() as u64)?;
            vfs.sync(id)?;
            Ok(data.len())
        })
    }

    /// Write each page at `page_number * page_size`, then flush once
    ///
    /// A page larger than `page_size` is rejected before anything is
    /// written.
    pub fn persist_dirty_pages(
        &mut self,
        name: &str,
        pages: &[DirtyPage],
        page_size: usize,
    ) -> VfsResult<PersistStats> {
        let offsets = pages
            .iter()
            .map(|page| page_offset(page, page_size))
            .collect::<VfsResult<Vec<u64>>>()?;

        self.with_open(name, MAIN_DB_CREATE, |vfs, id| {
            let mut stats = PersistStats::default();
            for (page, offset) in pages.iter().zip(offsets) {
                vfs.write(id, &page.data, offset)?;
                stats.pages_written += 1;
                stats.bytes_written += page.data.len();
            }
            vfs.sync(id)?;
            Ok(stats)
        })
    }

    /// Import a SQLite database image under `name`
    ///
    /// The image must carry the SQLite header and be a non-zero multiple
    /// of 512 bytes. Its file-format bytes are forced to rollback-journal
    /// mode, since WAL needs shared memory this VFS does not provide.
    pub fn import_database(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        if data.is_empty() || data.len() % 512 != 0 {
            return Err(PoolError::InvalidDatabase(format!(
                "size {} is not a non-zero multiple of 512",
                data.len()
            )));
        }
        if !data.starts_with(SQLITE_HEADER) {
            return Err(PoolError::InvalidDatabase(
                "missing SQLite database header".to_string(),
            ));
        }

        let mut image = data.to_vec();
        image[18] = 1;
        image[19] = 1;

        Ok(self.write_file(name, &image)?)
    }
}
