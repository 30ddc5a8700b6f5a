//! # batchflow
//!
//! Client-side orchestration of many similar async requests: "delete these N
//! records" or "upload these N files" become a bounded, observable set of
//! concurrent calls.
//!
//! ## Quick Start
//!
//! ```rust
//! use batchflow::batch::BatchExecutor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor: BatchExecutor<u64, std::io::Error> = BatchExecutor::new()
//!     .with_chunk_size(50)
//!     .with_concurrency_limit(5)
//!     .with_progress_callback(|p| println!("{}% ({} failed)", p.progress_percent, p.failed));
//!
//! let ids: Vec<u64> = (1..=200).collect();
//! let doubled = executor
//!     .run(ids, |id, _index| async move { Ok(id * 2) })
//!     .await?;
//! assert_eq!(doubled.len(), 200);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure semantics
//!
//! A run fails as a whole if any item fails, returning only the first
//! recorded failure. Which items failed, with their errors and timings, is
//! reported through the progress callback: the last snapshot of a run lists
//! every settled item.
//!
//! ## Modules
//!
//! - [`batch`]: Chunking, concurrency groups, progress and failure aggregation
//! - [`api`]: Endpoint client that fans ids/files out through the executor
//! - [`config`]: Client configuration from JSON or environment
//! - [`metrics`]: Prometheus metrics for runs and items
//! - [`logging`]: Tracing subscriber setup

#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for batchflow operations
pub type Result<T> = std::result::Result<T, BatchFlowError>;

/// Main error type for configuration and plumbing
#[derive(Error, Debug)]
pub enum BatchFlowError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unrecognised HTTP method name
    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// API call failure
    #[error("API error: {0}")]
    Api(#[from] api::ApiError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tracing subscriber could not be installed
    #[error("Logging setup error: {0}")]
    Logging(String),
}

/// Batch execution engine
pub mod batch;

/// API client layer
pub mod api;

/// Client configuration
pub mod config;

/// Logging setup
pub mod logging;

/// Prometheus metrics
pub mod metrics;
