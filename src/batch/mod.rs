//! Batch execution engine
//!
//! [`BatchExecutor`] turns one logical operation over N work items into a
//! bounded, observable set of concurrent calls.
//!
//! Note the two result channels: [`BatchExecutor::run`] is all-or-nothing and
//! fails if any item failed, while the [`ProgressSnapshot`]s delivered to the
//! progress callback carry every item's outcome, error and timing. Callers
//! that need partial results must read them from the last snapshot.

pub mod error_handling;
pub mod executor;
mod progress;
pub mod scheduler;
pub mod types;

pub use error_handling::*;
pub use executor::*;
pub use scheduler::*;
pub use types::*;
