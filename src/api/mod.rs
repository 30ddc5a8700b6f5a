//! API client layer
//!
//! Resolves endpoint paths against the configured base URL and fans ids or
//! file uploads out through the [`batch`](crate::batch) executor. The HTTP
//! transport itself is supplied by the caller.

pub mod client;
pub mod transport;
pub mod types;
pub mod url;

pub use client::*;
pub use transport::*;
pub use types::*;
