//! Dispatcher Module
//!
//! Turns requests into VFS calls and results into responses.
//!
//! ## Architecture
//! ```text
//!   caller ──Request──▶ WorkerHandle ──channel──▶ worker thread
//!                                                    │
//!                                              Dispatcher::handle
//!                                                    │
//!   caller ◀──Response── WorkerHandle ◀──channel─────┘
//! ```
//! - One dispatcher owns the pool; requests run strictly in receipt order
//! - Every failure, panics included, becomes `{success: false, error}`

mod handler;
mod log_level;
mod worker;

pub use handler::{Dispatcher, LogHook};
pub use log_level::LogLevel;
pub use worker::{Worker, WorkerHandle};
