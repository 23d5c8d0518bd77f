//! File-backed slot store
//!
//! Each slot is a regular file inside the opaque directory. An acquired
//! handle holds an exclusive advisory lock on its file, so a second
//! acquirer (another process, or another open of the same file) sees
//! the slot as busy until the handle is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::{AcquireError, SlotHandle, SlotStore};

/// Slot store over a directory of files
pub struct FsStore {
    /// Directory holding the slot files
    dir: PathBuf,
}

impl FsStore {
    /// Open or create the slot directory
    pub fn open(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Get the slot directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(file: File, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError> {
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Box::new(FsSlot {
                file,
                name: name.to_string(),
            })),
            Err(e) if is_contended(&e) => Err(AcquireError::Busy),
            Err(e) => Err(AcquireError::Io(e)),
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    match (e.raw_os_error(), fs2::lock_contended_error().raw_os_error()) {
        (Some(code), Some(contended)) => code == contended,
        _ => false,
    }
}

impl SlotStore for FsStore {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    fn create(&mut self, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(self.dir.join(name))?;
        Self::lock(file, name)
    }

    fn acquire(&mut self, name: &str) -> Result<Box<dyn SlotHandle>, AcquireError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.dir.join(name))?;
        Self::lock(file, name)
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        match fs::remove_file(self.dir.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// An acquired slot file
pub struct FsSlot {
    file: File,
    name: String,
}

impl FsSlot {
    /// Name of the slot file
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SlotHandle for FsSlot {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(filled)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
        self.file.set_len(size)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl Drop for FsSlot {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!("Failed to unlock slot {}: {}", self.name, e);
        }
    }
}
