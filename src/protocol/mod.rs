//! Protocol Module
//!
//! Defines the request/response protocol between a caller and the worker.
//!
//! ## Message Shapes (JSON)
//! ```text
//! Request:  { "id": 7, "operation": "readFile", "args": { "filename": "a.db" } }
//! Response: { "id": 7, "success": true,  "result": { "data": [...] } }
//!           { "id": 7, "success": false, "error": "..." }
//! ```
//!
//! ## Frame Format (TCP transport)
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Kind (1) │ Len (4)  │        JSON Payload         │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Frame Kinds
//! - 0x01: REQUEST
//! - 0x02: RESPONSE

mod codec;
mod command;
mod message;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, FrameKind, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use command::Command;
pub use message::{Request, Response};
