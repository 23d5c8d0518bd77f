//! Logical path normalization
//!
//! `/a.db`, `./a.db`, `a//b/../a.db` all name the same file. Normalized
//! paths have no leading slash, no empty or `.` segments, and `..`
//! resolved (never above the root).

/// Normalize a logical path; `None` if nothing remains
pub fn normalize_path(name: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
