//! Shared accumulator for one batch run.
//!
//! Items of a concurrent group settle in any order, each taking the lock to
//! bump counters and append its outcome. Snapshots are built under the lock
//! and delivered after it is released.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::batch::error_handling::ItemFailure;
use crate::batch::types::{ItemOutcome, ItemStatus, ProgressCallback, ProgressMetrics, ProgressSnapshot};
use crate::metrics;

struct ProgressState<T, E> {
    completed: usize,
    failed: usize,
    in_progress: usize,
    current_chunk: usize,
    results: Vec<ItemOutcome<T, E>>,
    first_failure: Option<ItemFailure<E>>,
}

pub(crate) struct ProgressTracker<T, E> {
    total: usize,
    total_chunks: usize,
    started: Instant,
    callback: Option<ProgressCallback<T, E>>,
    state: Mutex<ProgressState<T, E>>,
}

impl<T: Clone, E> ProgressTracker<T, E> {
    pub(crate) fn new(total: usize, total_chunks: usize, callback: Option<ProgressCallback<T, E>>) -> Self {
        Self {
            total,
            total_chunks,
            started: Instant::now(),
            callback,
            state: Mutex::new(ProgressState {
                completed: 0,
                failed: 0,
                in_progress: 0,
                current_chunk: 0,
                results: Vec::with_capacity(total),
                first_failure: None,
            }),
        }
    }

    pub(crate) fn enter_chunk(&self, chunk_index: usize) {
        self.state.lock().current_chunk = chunk_index;
    }

    /// Announce a group of `count` items about to launch
    pub(crate) fn launch(&self, count: usize) {
        let snapshot = {
            let mut state = self.state.lock();
            state.in_progress += count;
            self.snapshot(&state)
        };
        metrics::record_launched(count);
        self.emit(snapshot);
    }

    /// Record a settled item, handing a success value back to the caller
    pub(crate) fn settle(&self, index: usize, outcome: Result<T, E>, duration: Duration) -> Option<T> {
        let (value, snapshot) = {
            let mut state = self.state.lock();
            state.completed += 1;
            state.in_progress = state.in_progress.saturating_sub(1);

            let value = match outcome {
                Ok(value) => {
                    debug!(index, duration_ms = duration.as_millis() as u64, "Item completed");
                    state.results.push(ItemOutcome {
                        index,
                        status: ItemStatus::Completed,
                        value: Some(value.clone()),
                        error: None,
                        duration,
                    });
                    metrics::record_item(ItemStatus::Completed, duration);
                    Some(value)
                }
                Err(error) => {
                    warn!(index, duration_ms = duration.as_millis() as u64, "Item failed");
                    let error = Arc::new(error);
                    state.failed += 1;
                    state.results.push(ItemOutcome {
                        index,
                        status: ItemStatus::Failed,
                        value: None,
                        error: Some(Arc::clone(&error)),
                        duration,
                    });
                    if state.first_failure.is_none() {
                        state.first_failure = Some(ItemFailure { index, error, duration });
                    }
                    metrics::record_item(ItemStatus::Failed, duration);
                    None
                }
            };

            (value, self.snapshot(&state))
        };

        self.emit(snapshot);
        value
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.state.lock().first_failure.is_some()
    }

    pub(crate) fn take_failure(&self) -> Option<ItemFailure<E>> {
        self.state.lock().first_failure.take()
    }

    pub(crate) fn counts(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.completed, state.failed)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Closing snapshot once nothing is in flight
    pub(crate) fn finish(&self) {
        let snapshot = {
            let mut state = self.state.lock();
            state.in_progress = 0;
            self.snapshot(&state)
        };
        self.emit(snapshot);
    }

    fn snapshot(&self, state: &ProgressState<T, E>) -> Option<ProgressSnapshot<T, E>> {
        self.callback.as_ref()?;

        let elapsed = self.started.elapsed();
        let metrics = ProgressMetrics::compute(state.completed, self.total, elapsed);

        Some(ProgressSnapshot {
            progress_percent: metrics.progress_percent,
            completed: state.completed,
            total: self.total,
            failed: state.failed,
            in_progress: state.in_progress,
            estimated_remaining_ms: metrics.estimated_remaining_ms,
            average_item_ms: metrics.average_item_ms,
            current_chunk: state.current_chunk + 1,
            total_chunks: self.total_chunks,
            throughput_per_sec: metrics.throughput_per_sec,
            elapsed,
            results: state.results.clone(),
        })
    }

    fn emit(&self, snapshot: Option<ProgressSnapshot<T, E>>) {
        if let (Some(callback), Some(snapshot)) = (&self.callback, snapshot) {
            callback(&snapshot);
        }
    }
}
