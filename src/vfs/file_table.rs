//! Virtual File Table
//!
//! Maps open-file ids to what they were opened as. Purely in-memory:
//! rebuilt from nothing whenever the worker restarts.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pool::SlotId;

/// Ephemeral handle returned by `open`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An entry in the open-file table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    /// Normalized logical path
    pub path: String,
    /// Slot the path is bound to
    pub slot: SlotId,
    /// Flags passed to `open`
    pub flags: u32,
}

/// Open-file table
#[derive(Debug)]
pub struct FileTable {
    entries: HashMap<FileId, OpenFile>,
    next_id: u32,
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register an open file
    ///
    /// Ids wrap around after `u32::MAX` but skip any id still open.
    pub fn insert(&mut self, file: OpenFile) -> FileId {
        let mut id = FileId(self.next_id);
        while self.entries.contains_key(&id) {
            id = FileId(Self::following(id.0));
        }
        self.next_id = Self::following(id.0);
        self.entries.insert(id, file);
        id
    }

    fn following(id: u32) -> u32 {
        id.wrapping_add(1).max(1)
    }

    pub fn get(&self, id: FileId) -> Option<&OpenFile> {
        self.entries.get(&id)
    }

    pub fn remove(&mut self, id: FileId) -> Option<OpenFile> {
        self.entries.remove(&id)
    }

    /// Drop every entry for `path`; returns how many were dropped
    pub fn remove_path(&mut self, path: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, file| file.path != path);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
