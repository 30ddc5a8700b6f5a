use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal status of a single work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Processor resolved with a value
    Completed,
    /// Processor resolved with an error
    Failed,
}

/// Recorded outcome of one work item, keyed by its global index
#[derive(Debug)]
pub struct ItemOutcome<T, E> {
    /// Position of the item in the caller's input sequence
    pub index: usize,
    /// Whether the processor succeeded
    pub status: ItemStatus,
    /// Value produced by the processor (completed items only)
    pub value: Option<T>,
    /// Error produced by the processor (failed items only)
    pub error: Option<Arc<E>>,
    /// Wall time between launching the item and its settlement
    pub duration: Duration,
}

impl<T: Clone, E> Clone for ItemOutcome<T, E> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            status: self.status,
            value: self.value.clone(),
            error: self.error.clone(),
            duration: self.duration,
        }
    }
}

impl<T, E> ItemOutcome<T, E> {
    pub fn is_failed(&self) -> bool {
        self.status == ItemStatus::Failed
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Point-in-time view of a batch run.
///
/// `completed` counts every settled item, failed ones included, so
/// `completed >= failed` always holds. `results` is append-only in
/// settlement order; use [`ItemOutcome::index`] to map back to input order.
#[derive(Debug)]
pub struct ProgressSnapshot<T, E> {
    /// `round(completed / total * 100)`, 0 for an empty run
    pub progress_percent: u32,
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    /// Items launched but not yet settled
    pub in_progress: usize,
    pub estimated_remaining_ms: Option<u64>,
    pub average_item_ms: Option<f64>,
    /// 1-based ordinal of the chunk currently being drained
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub throughput_per_sec: Option<f64>,
    /// Time since the run started, as used for the derived metrics above
    pub elapsed: Duration,
    pub results: Vec<ItemOutcome<T, E>>,
}

impl<T: Clone, E> Clone for ProgressSnapshot<T, E> {
    fn clone(&self) -> Self {
        Self {
            progress_percent: self.progress_percent,
            completed: self.completed,
            total: self.total,
            failed: self.failed,
            in_progress: self.in_progress,
            estimated_remaining_ms: self.estimated_remaining_ms,
            average_item_ms: self.average_item_ms,
            current_chunk: self.current_chunk,
            total_chunks: self.total_chunks,
            throughput_per_sec: self.throughput_per_sec,
            elapsed: self.elapsed,
            results: self.results.clone(),
        }
    }
}

impl<T, E> ProgressSnapshot<T, E> {
    /// Outcomes of items whose processor failed
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome<T, E>> {
        self.results.iter().filter(|r| r.status == ItemStatus::Failed)
    }

    /// Outcomes of items whose processor succeeded
    pub fn successes(&self) -> impl Iterator<Item = &ItemOutcome<T, E>> {
        self.results.iter().filter(|r| r.status == ItemStatus::Completed)
    }

    /// True once every item has settled and nothing is in flight
    pub fn is_finished(&self) -> bool {
        self.completed == self.total && self.in_progress == 0
    }

    /// Metrics recomputed from this snapshot's own counters
    pub fn metrics(&self) -> ProgressMetrics {
        ProgressMetrics::compute(self.completed, self.total, self.elapsed)
    }
}

/// Derived rate/ETA figures for a set of counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressMetrics {
    pub progress_percent: u32,
    pub average_item_ms: Option<f64>,
    pub throughput_per_sec: Option<f64>,
    pub estimated_remaining_ms: Option<u64>,
}

impl ProgressMetrics {
    pub fn compute(completed: usize, total: usize, elapsed: Duration) -> Self {
        let elapsed_ms = elapsed.as_nanos() as f64 / 1_000_000.0;

        let progress_percent = if total > 0 {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };

        let average_item_ms = (completed > 0).then(|| elapsed_ms / completed as f64);

        let throughput_per_sec = if completed > 0 && elapsed_ms > 0.0 {
            Some(completed as f64 * 1000.0 / elapsed_ms)
        } else {
            None
        };

        let remaining = total.saturating_sub(completed);
        let estimated_remaining_ms = match average_item_ms {
            Some(avg) if avg > 0.0 && remaining > 0 => Some((avg * remaining as f64).round() as u64),
            _ => None,
        };

        Self {
            progress_percent,
            average_item_ms,
            throughput_per_sec,
            estimated_remaining_ms,
        }
    }
}

/// Callback receiving every progress snapshot of a run
pub type ProgressCallback<T, E> = Arc<dyn Fn(&ProgressSnapshot<T, E>) + Send + Sync>;

/// Batch execution configuration
pub struct BatchConfig<T, E> {
    /// Items per sequentially drained chunk; `None` means a single chunk
    pub chunk_size: Option<usize>,
    /// Items in flight at once within a chunk; `None` means the whole chunk
    pub concurrency_limit: Option<usize>,
    pub on_progress: Option<ProgressCallback<T, E>>,
}

impl<T, E> BatchConfig<T, E> {
    pub fn new() -> Self {
        Self {
            chunk_size: None,
            concurrency_limit: None,
            on_progress: None,
        }
    }

    /// Set the chunk size. Zero clears it.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = (size > 0).then_some(size);
        self
    }

    /// Set the concurrency limit. Zero clears it.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = (limit > 0).then_some(limit);
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressSnapshot<T, E>) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Whether chunking or a concurrency cap is configured
    pub fn has_scheduling(&self) -> bool {
        self.chunk_size.is_some_and(|s| s > 0) || self.concurrency_limit.is_some_and(|l| l > 0)
    }
}

impl<T, E> Default for BatchConfig<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for BatchConfig<T, E> {
    fn clone(&self) -> Self {
        Self {
            chunk_size: self.chunk_size,
            concurrency_limit: self.concurrency_limit,
            on_progress: self.on_progress.clone(),
        }
    }
}

impl<T, E> fmt::Debug for BatchConfig<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("chunk_size", &self.chunk_size)
            .field("concurrency_limit", &self.concurrency_limit)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}
