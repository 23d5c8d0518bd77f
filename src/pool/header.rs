//! Header Block codec
//!
//! Pure encoding/decoding of the metadata block at the start of every
//! physical slot. The pool layers slot I/O and bookkeeping on top.
//!
//! ## Layout (first sector of a slot)
//! ```text
//! ┌──────────────────────────────┬─────────────┬──────────────────────┐
//! │ Path (512, NUL-padded UTF-8) │ Flags (4 BE)│ Digest (2 × u32 LE)  │
//! └──────────────────────────────┴─────────────┴──────────────────────┘
//! 0                              512           516                    524
//! ... zero padding up to 4096, then the data region
//! ```
//!
//! The digest covers path + flags and is only computed when the
//! [`COMPUTE_DIGEST`](crate::flags::COMPUTE_DIGEST) bit is set; otherwise
//! it is stored as zeros.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PoolError, Result};
use crate::flags::{self, COMPUTE_DIGEST};

/// Sector size; the data region starts after one sector
pub const SECTOR_SIZE: usize = 4096;

/// Maximum path length in bytes
pub const HEADER_MAX_PATH_SIZE: usize = 512;

pub const HEADER_FLAGS_SIZE: usize = 4;
pub const HEADER_DIGEST_SIZE: usize = 8;

/// Bytes covered by the digest: path region + flags
pub const HEADER_CORPUS_SIZE: usize = HEADER_MAX_PATH_SIZE + HEADER_FLAGS_SIZE;

pub const HEADER_OFFSET_FLAGS: usize = HEADER_MAX_PATH_SIZE;
pub const HEADER_OFFSET_DIGEST: usize = HEADER_CORPUS_SIZE;

/// Bytes of the header that carry information
pub const HEADER_SIZE: usize = HEADER_CORPUS_SIZE + HEADER_DIGEST_SIZE;

/// Physical offset of logical byte 0
pub const HEADER_OFFSET_DATA: u64 = SECTOR_SIZE as u64;

const DIGEST_SEED_1: u32 = 0xdead_beef;
const DIGEST_SEED_2: u32 = 0x41c6_ce57;
const DIGEST_MUL_1: u32 = 2_654_435_761;
const DIGEST_MUL_2: u32 = 104_729;

/// Rolling digest over the header corpus
///
/// Non-cryptographic: it catches stale or foreign headers, not tampering.
/// Returns `[0, 0]` when `flags` lacks the compute-digest bit.
pub fn compute_digest(corpus: &[u8], flags: u32) -> [u32; 2] {
    if flags & COMPUTE_DIGEST == 0 {
        return [0, 0];
    }

    let mut h1 = DIGEST_SEED_1;
    let mut h2 = DIGEST_SEED_2;
    for &b in corpus {
        h1 = (h1 ^ b as u32).wrapping_mul(DIGEST_MUL_1);
        h2 = (h2 ^ b as u32).wrapping_mul(DIGEST_MUL_2);
    }
    [h1, h2]
}

/// A decoded binding: the logical path a slot represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub path: String,
    pub flags: u32,
}

/// Why a header was rejected during decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Delete-on-close or non-persistent file category
    Ephemeral { flags: u32 },

    /// Stored digest does not match the corpus
    DigestMismatch { stored: [u32; 2], computed: [u32; 2] },

    /// Path bytes are not UTF-8
    InvalidPath,
}

/// Outcome of decoding a header block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Valid header with no path
    Empty,

    /// Valid header bound to a path
    Bound(Header),

    /// Header must be treated as empty
    Discard(DiscardReason),
}

/// Flags actually stored for an association
pub fn stored_flags(path: &str, flags: u32) -> u32 {
    if !path.is_empty() && flags != 0 {
        flags | COMPUTE_DIGEST
    } else {
        flags
    }
}

/// Encode a header block for `path` and `flags`
///
/// An empty path produces an unbound header.
pub fn encode_header(path: &str, flags: u32) -> Result<Bytes> {
    if path.len() > HEADER_MAX_PATH_SIZE {
        return Err(PoolError::PathTooLong {
            len: path.len(),
            max: HEADER_MAX_PATH_SIZE,
        });
    }
    if path.as_bytes().contains(&0) {
        return Err(PoolError::InvalidPath(path.to_string()));
    }

    let flags = stored_flags(path, flags);

    let mut buf = BytesMut::with_capacity(HEADER_SIZE);
    buf.put_slice(path.as_bytes());
    buf.put_bytes(0, HEADER_MAX_PATH_SIZE - path.len());
    buf.put_u32(flags);

    let [d1, d2] = compute_digest(&buf[..HEADER_CORPUS_SIZE], flags);
    buf.put_u32_le(d1);
    buf.put_u32_le(d2);

    Ok(buf.freeze())
}

/// Decode a header block
///
/// `bytes` may be shorter than [`HEADER_SIZE`] (a freshly created slot);
/// missing bytes read as zero. Never fails: anything inconsistent is
/// reported as [`Decoded::Discard`].
pub fn decode_header(bytes: &[u8]) -> Decoded {
    let mut block = [0u8; HEADER_SIZE];
    let n = bytes.len().min(HEADER_SIZE);
    block[..n].copy_from_slice(&bytes[..n]);

    let corpus = &block[..HEADER_CORPUS_SIZE];
    let flags = (&block[HEADER_OFFSET_FLAGS..]).get_u32();

    let mut digest = &block[HEADER_OFFSET_DIGEST..];
    let stored = [digest.get_u32_le(), digest.get_u32_le()];
    let computed = compute_digest(corpus, flags);
    if stored != computed {
        return Decoded::Discard(DiscardReason::DigestMismatch { stored, computed });
    }

    if corpus[0] != 0 && flags::is_ephemeral(flags) {
        return Decoded::Discard(DiscardReason::Ephemeral { flags });
    }

    let path_region = &corpus[..HEADER_MAX_PATH_SIZE];
    let path_len = path_region
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(HEADER_MAX_PATH_SIZE);
    if path_len == 0 {
        return Decoded::Empty;
    }

    match std::str::from_utf8(&path_region[..path_len]) {
        Ok(path) => Decoded::Bound(Header {
            path: path.to_string(),
            flags,
        }),
        Err(_) => Decoded::Discard(DiscardReason::InvalidPath),
    }
}
