//! Protocol codec
//!
//! Framing for requests and responses on a byte stream.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Kind (1) │ Len (4)  │        JSON Payload         │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! The length is big-endian and counts payload bytes only.

use std::io::{Read, Write};

use crate::error::{PoolError, Result};

use super::{Request, Response};

/// Header size: 1 byte kind + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (256 MB); whole database images travel in one frame
pub const MAX_PAYLOAD_SIZE: u32 = 256 * 1024 * 1024;

/// Frame kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Request = 0x01,
    Response = 0x02,
}

impl FrameKind {
    fn name(self) -> &'static str {
        match self {
            FrameKind::Request => "request",
            FrameKind::Response => "response",
        }
    }
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(request)?;
    encode_frame(FrameKind::Request, &payload)
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let payload = decode_frame(FrameKind::Request, bytes)?;
    Ok(serde_json::from_slice(payload)?)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(response)?;
    encode_frame(FrameKind::Response, &payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let payload = decode_frame(FrameKind::Response, bytes)?;
    Ok(serde_json::from_slice(payload)?)
}

// =============================================================================
// Framing
// =============================================================================

fn encode_frame(kind: FrameKind, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(PoolError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(kind as u8);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    Ok(message)
}

/// Validate the header and return the payload slice
fn decode_frame(kind: FrameKind, bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < HEADER_SIZE {
        return Err(PoolError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            kind.name(),
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = check_header(kind, &bytes[..HEADER_SIZE])?;

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(PoolError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            kind.name(),
            total_len,
            bytes.len()
        )));
    }

    Ok(&bytes[HEADER_SIZE..total_len])
}

/// Check kind and length; returns the payload length
fn check_header(kind: FrameKind, header: &[u8]) -> Result<usize> {
    if header[0] != kind as u8 {
        return Err(PoolError::Protocol(format!(
            "Unexpected frame kind: 0x{:02x} (expected {})",
            header[0],
            kind.name()
        )));
    }

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(PoolError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            kind.name(),
            payload_len,
            MAX_PAYLOAD_SIZE
        )));
    }

    Ok(payload_len as usize)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one frame's payload; blocks until complete
fn read_frame<R: Read>(reader: &mut R, kind: FrameKind) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = check_header(kind, &header)?;

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }
    Ok(payload)
}

/// Read a complete request from a stream
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let payload = read_frame(reader, FrameKind::Request)?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let payload = read_frame(reader, FrameKind::Response)?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
