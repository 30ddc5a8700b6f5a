//! Batch Executor
//!
//! Runs a caller-supplied async processor over an ordered set of work items:
//! - Sequential chunks bounded by `chunk_size`
//! - Concurrency groups within a chunk bounded by `concurrency_limit`
//! - Progress snapshots after every state change
//! - Fail-fast return with full per-item detail in the progress stream
//!
//! Items of a group are driven jointly inside the calling task; nothing is
//! spawned, so the processor's futures need not be `'static`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::batch::error_handling::{BatchExecutionError, ItemFailure};
use crate::batch::progress::ProgressTracker;
use crate::batch::scheduler::ChunkPlan;
use crate::batch::types::{BatchConfig, ItemStatus, ProgressSnapshot};
use crate::metrics;

/// Executes work items in chunks with bounded concurrency
pub struct BatchExecutor<T, E> {
    config: BatchConfig<T, E>,
}

impl<T, E> BatchExecutor<T, E>
where
    T: Clone + Send,
    E: Send + Sync,
{
    /// Create an executor with no chunking, no concurrency cap and no progress callback
    pub fn new() -> Self {
        Self {
            config: BatchConfig::new(),
        }
    }

    pub fn from_config(config: BatchConfig<T, E>) -> Self {
        Self { config }
    }

    /// Set the number of items drained per sequential chunk (0 disables chunking)
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config = self.config.with_chunk_size(size);
        self
    }

    /// Set the maximum number of items in flight within a chunk (0 removes the cap)
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.config = self.config.with_concurrency_limit(limit);
        self
    }

    /// Set progress callback
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressSnapshot<T, E>) + Send + Sync + 'static,
    {
        self.config = self.config.with_progress_callback(callback);
        self
    }

    pub fn config(&self) -> &BatchConfig<T, E> {
        &self.config
    }

    /// Run `processor` over `items`, returning values in input order.
    ///
    /// Fails with the first recorded item failure if any item failed. The
    /// failing group is always drained before returning, and no later group
    /// or chunk is launched. Every settled item, including the successful
    /// siblings of a failure, appears in the final progress snapshot.
    ///
    /// A single item with neither chunking nor a concurrency cap bypasses the
    /// batch machinery: the processor is called once and no snapshot is
    /// emitted.
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4(), total = tracing::field::Empty))]
    pub async fn run<I, F, Fut>(
        &self,
        items: impl IntoIterator<Item = I>,
        processor: F,
    ) -> Result<Vec<T>, BatchExecutionError<E>>
    where
        F: Fn(I, usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let items: Vec<I> = items.into_iter().collect();
        let total = items.len();
        tracing::Span::current().record("total", total);

        if total == 1 && !self.config.has_scheduling() {
            return Self::run_single(items, processor).await;
        }

        let plan = ChunkPlan::new(total, self.config.chunk_size, self.config.concurrency_limit);
        let tracker = ProgressTracker::new(total, plan.total_chunks(), self.config.on_progress.clone());

        info!(
            total,
            chunk_size = ?self.config.chunk_size,
            concurrency_limit = ?self.config.concurrency_limit,
            total_chunks = plan.total_chunks(),
            "Starting batch run"
        );
        let _in_flight = metrics::RunGuard::start();

        let mut slots: Vec<Option<T>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        let mut pending = items.into_iter();

        'chunks: for (chunk_index, chunk) in plan.chunks().enumerate() {
            tracker.enter_chunk(chunk_index);
            debug!(chunk = chunk_index + 1, start = chunk.start, end = chunk.end, "Draining chunk");

            for group in plan.groups(chunk) {
                tracker.launch(group.len());

                let launched: Vec<_> = group
                    .clone()
                    .zip(pending.by_ref())
                    .map(|(index, item)| {
                        let started = Instant::now();
                        let fut = processor(item, index);
                        let tracker = &tracker;
                        async move {
                            let outcome = fut.await;
                            (index, tracker.settle(index, outcome, started.elapsed()))
                        }
                    })
                    .collect();

                for (index, value) in join_all(launched).await {
                    slots[index] = value;
                }

                if tracker.has_failed() {
                    break 'chunks;
                }
            }
        }

        tracker.finish();

        let (completed, failed) = tracker.counts();
        let elapsed = tracker.elapsed();

        if let Some(failure) = tracker.take_failure() {
            error!(
                completed,
                failed,
                first_failed_index = failure.index,
                duration_ms = elapsed.as_millis() as u64,
                "Batch run failed"
            );
            metrics::record_run(false, elapsed);
            return Err(BatchExecutionError::new(failure));
        }

        info!(completed, duration_ms = elapsed.as_millis() as u64, "Batch run completed");
        metrics::record_run(true, elapsed);

        Ok(slots.into_iter().flatten().collect())
    }

    async fn run_single<I, F, Fut>(items: Vec<I>, processor: F) -> Result<Vec<T>, BatchExecutionError<E>>
    where
        F: Fn(I, usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(item) = items.into_iter().next() else {
            return Ok(Vec::new());
        };

        let _in_flight = metrics::RunGuard::start();
        metrics::record_launched(1);

        let started = Instant::now();
        let outcome = processor(item, 0).await;
        let duration = started.elapsed();

        match outcome {
            Ok(value) => {
                metrics::record_item(ItemStatus::Completed, duration);
                metrics::record_run(true, duration);
                Ok(vec![value])
            }
            Err(error) => {
                error!(duration_ms = duration.as_millis() as u64, "Single item run failed");
                metrics::record_item(ItemStatus::Failed, duration);
                metrics::record_run(false, duration);
                Err(BatchExecutionError::new(ItemFailure {
                    index: 0,
                    error: Arc::new(error),
                    duration,
                }))
            }
        }
    }
}

impl<T, E> Default for BatchExecutor<T, E>
where
    T: Clone + Send,
    E: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for BatchExecutor<T, E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}
