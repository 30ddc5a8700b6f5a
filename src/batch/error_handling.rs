use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// A single work item whose processor resolved with an error
#[derive(Debug)]
pub struct ItemFailure<E> {
    /// Global index of the failed item
    pub index: usize,
    pub error: Arc<E>,
    pub duration: Duration,
}

impl<E> Clone for ItemFailure<E> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            error: Arc::clone(&self.error),
            duration: self.duration,
        }
    }
}

/// Run-level failure returned by [`BatchExecutor::run`](crate::batch::BatchExecutor::run).
///
/// Carries only the first failure the engine recorded. Siblings that settled
/// alongside it, successful or not, are reported through the progress
/// callback; the last snapshot of the run holds all of them.
#[derive(Error, Debug)]
#[error("Batch item {index} failed after {}ms: {error}", .duration.as_millis())]
pub struct BatchExecutionError<E> {
    index: usize,
    #[source]
    error: Arc<E>,
    duration: Duration,
}

impl<E> BatchExecutionError<E> {
    pub fn new(failure: ItemFailure<E>) -> Self {
        Self {
            index: failure.index,
            error: failure.error,
            duration: failure.duration,
        }
    }

    /// Global index of the item that failed the run
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn error(&self) -> &E {
        &self.error
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn into_failure(self) -> ItemFailure<E> {
        ItemFailure {
            index: self.index,
            error: self.error,
            duration: self.duration,
        }
    }

    /// Take the item error back, or the shared handle if a progress
    /// snapshot still holds a reference to it.
    pub fn into_error(self) -> Result<E, Arc<E>> {
        Arc::try_unwrap(self.error)
    }
}

impl<E> From<ItemFailure<E>> for BatchExecutionError<E> {
    fn from(failure: ItemFailure<E>) -> Self {
        Self::new(failure)
    }
}
