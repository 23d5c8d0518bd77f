//! Dirty-page tracking
//!
//! Records which pages of each file were touched since the last reset,
//! so a caller can persist or replicate only those pages.

use std::collections::HashMap;

/// One bit per page, grown on demand
#[derive(Debug, Default)]
struct PageBitmap {
    words: Vec<u32>,
    total_pages: u32,
}

impl PageBitmap {
    fn mark_range(&mut self, first: u32, last: u32) {
        let required = last + 1;
        if required > self.total_pages {
            let words = required.div_ceil(32) as usize;
            if words > self.words.len() {
                if self.words.try_reserve_exact(words - self.words.len()).is_err() {
                    tracing::warn!("Cannot track {} dirty pages", required);
                    return;
                }
                self.words.resize(words, 0);
            }
            self.total_pages = required;
        }

        for page in first..=last {
            self.words[(page / 32) as usize] |= 1 << (page % 32);
        }
    }

    fn pages(&self) -> Vec<u32> {
        (0..self.total_pages)
            .filter(|page| self.words[(page / 32) as usize] & (1 << (page % 32)) != 0)
            .collect()
    }

    fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}

/// Per-path dirty page sets
#[derive(Debug)]
pub struct DirtyTracker {
    page_size: u64,
    files: HashMap<String, PageBitmap>,
}

impl DirtyTracker {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1) as u64,
            files: HashMap::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size as usize
    }

    /// Mark every page overlapping `[offset, offset + amount)`
    pub fn mark(&mut self, path: &str, offset: u64, amount: usize) {
        if amount == 0 {
            return;
        }

        let first = offset / self.page_size;
        let last = (offset + amount as u64 - 1) / self.page_size;
        let (Ok(first), Ok(last)) = (u32::try_from(first), u32::try_from(last)) else {
            tracing::warn!("Dirty range beyond page addressing for {}: offset={}", path, offset);
            return;
        };

        self.files
            .entry(path.to_string())
            .or_default()
            .mark_range(first, last);
    }

    /// Dirty page numbers of `path`, ascending
    pub fn dirty_pages(&self, path: &str) -> Vec<u32> {
        self.files.get(path).map(PageBitmap::pages).unwrap_or_default()
    }

    /// Mark every page of `path` clean
    pub fn reset(&mut self, path: &str) {
        if let Some(bitmap) = self.files.get_mut(path) {
            bitmap.clear();
        }
    }

    /// Stop tracking `path`
    pub fn forget(&mut self, path: &str) {
        self.files.remove(path);
    }

    /// Stop tracking every path
    pub fn clear(&mut self) {
        self.files.clear();
    }
}
