//! Network Module
//!
//! TCP transport for the request/response protocol.
//!
//! ## Architecture
//! - Single acceptor loop on the calling thread
//! - One connection served at a time, so requests stay in receipt order
//! - Requests routed through the Dispatcher

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::Connection;
