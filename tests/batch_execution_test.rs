//! Batch Execution Tests
//!
//! Chunking, concurrency groups, ordering and progress reporting of the
//! batch executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use batchflow::batch::{BatchExecutor, ItemStatus, ProgressSnapshot};
use pretty_assertions::assert_eq;

type Snapshots = Arc<Mutex<Vec<ProgressSnapshot<usize, String>>>>;

/// Tracks how many processor calls are in flight at once
#[derive(Default)]
struct LoadProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl LoadProbe {
    async fn visit(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // suspend once so the rest of the group gets launched before anyone settles
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Size of every group launch, read off rises in `in_progress`
fn launch_sizes(snapshots: &[ProgressSnapshot<usize, String>]) -> Vec<usize> {
    let mut before = 0;
    let mut sizes = Vec::new();
    for snapshot in snapshots {
        if snapshot.in_progress > before {
            sizes.push(snapshot.in_progress - before);
        }
        before = snapshot.in_progress;
    }
    sizes
}

fn recording_executor(chunk_size: usize, concurrency_limit: usize) -> (BatchExecutor<usize, String>, Snapshots) {
    let snapshots: Snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = snapshots.clone();
    let executor = BatchExecutor::new()
        .with_chunk_size(chunk_size)
        .with_concurrency_limit(concurrency_limit)
        .with_progress_callback(move |snapshot: &ProgressSnapshot<usize, String>| {
            sink.lock().unwrap().push(snapshot.clone());
        });
    (executor, snapshots)
}

#[tokio::test]
async fn test_chunked_run_drains_chunks_in_sequence() {
    let (executor, snapshots) = recording_executor(3, 0);
    let probe = Arc::new(LoadProbe::default());

    let items: Vec<usize> = (0..10).collect();
    let results = executor
        .run(items, |item, _| {
            let probe = probe.clone();
            async move {
                probe.visit().await;
                Ok(item * 10)
            }
        })
        .await
        .expect("all items succeed");

    assert_eq!(results, (0..10).map(|i| i * 10).collect::<Vec<_>>());
    assert_eq!(probe.peak(), 3, "a chunk of 3 runs fully concurrently, never more");

    let snapshots = snapshots.lock().unwrap();
    let last = snapshots.last().expect("final snapshot");
    assert_eq!(last.completed, 10);
    assert_eq!(last.failed, 0);
    assert_eq!(last.total_chunks, 4);
    assert_eq!(last.current_chunk, 4);
    assert_eq!(last.in_progress, 0);
    assert_eq!(last.progress_percent, 100);

    // one launch per chunk (3,3,3,1), one per item, one closing snapshot
    assert_eq!(launch_sizes(&snapshots), vec![3, 3, 3, 1]);
    assert_eq!(snapshots.len(), 4 + 10 + 1);
}

#[tokio::test]
async fn test_concurrency_limit_slices_single_chunk() {
    let (executor, snapshots) = recording_executor(0, 2);
    let probe = Arc::new(LoadProbe::default());

    let results = executor
        .run(vec!["a", "b", "c", "d", "e"], |item, index| {
            let probe = probe.clone();
            async move {
                probe.visit().await;
                Ok::<_, String>(index + item.len())
            }
        })
        .await
        .expect("all items succeed");

    assert_eq!(results, vec![1, 2, 3, 4, 5]);
    assert_eq!(probe.peak(), 2);

    let snapshots = snapshots.lock().unwrap();
    assert_eq!(launch_sizes(&snapshots), vec![2, 2, 1]);
    assert!(snapshots.iter().all(|s| s.total_chunks == 1 && s.current_chunk == 1));
}

#[tokio::test]
async fn test_chunk_and_limit_combined() {
    let (executor, snapshots) = recording_executor(4, 3);
    let probe = Arc::new(LoadProbe::default());

    let results = executor
        .run((0..10).collect::<Vec<usize>>(), |item, index| {
            let probe = probe.clone();
            async move {
                assert_eq!(item, index);
                probe.visit().await;
                Ok(item)
            }
        })
        .await
        .expect("all items succeed");

    assert_eq!(results, (0..10).collect::<Vec<_>>());
    assert_eq!(probe.peak(), 3);

    let snapshots = snapshots.lock().unwrap();
    let chunks_seen: Vec<usize> = snapshots.iter().map(|s| s.current_chunk).collect();
    assert!(chunks_seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(snapshots.last().map(|s| s.total_chunks), Some(3));
}

#[tokio::test]
async fn test_results_follow_input_order_not_completion_order() {
    let executor: BatchExecutor<usize, String> = BatchExecutor::new().with_concurrency_limit(4);

    // later items finish first
    let results = executor
        .run((0..4).collect::<Vec<usize>>(), |item, _| async move {
            for _ in 0..(4 - item) {
                tokio::task::yield_now().await;
            }
            Ok(item)
        })
        .await
        .expect("all items succeed");

    assert_eq!(results, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_progress_snapshot_invariants() {
    let (executor, snapshots) = recording_executor(3, 2);

    executor
        .run((0..8).collect::<Vec<usize>>(), |item, _| async move {
            tokio::task::yield_now().await;
            Ok(item)
        })
        .await
        .expect("all items succeed");

    let snapshots = snapshots.lock().unwrap();
    let first = snapshots.first().expect("initial snapshot");
    assert_eq!(first.completed, 0);
    assert_eq!(first.failed, 0);
    assert_eq!(first.in_progress, 2);
    assert!(first.results.is_empty());
    assert!(first.average_item_ms.is_none());
    assert!(first.estimated_remaining_ms.is_none());

    for pair in snapshots.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        assert!(after.completed >= before.completed, "completed never decreases");
        assert!(after.results.len() >= before.results.len());
        for (a, b) in before.results.iter().zip(&after.results) {
            assert_eq!(a.index, b.index, "results are append-only");
        }
    }

    for snapshot in snapshots.iter() {
        assert_eq!(snapshot.total, 8);
        assert_eq!(snapshot.completed, snapshot.results.len());
        assert!(snapshot.completed >= snapshot.failed);
        assert_eq!(snapshot.metrics().progress_percent, snapshot.progress_percent);
        assert_eq!(snapshot.metrics().average_item_ms, snapshot.average_item_ms);
        assert_eq!(snapshot.metrics().throughput_per_sec, snapshot.throughput_per_sec);
        assert_eq!(snapshot.metrics().estimated_remaining_ms, snapshot.estimated_remaining_ms);
    }

    let last = snapshots.last().expect("final snapshot");
    assert!(last.is_finished());
    let mut indices: Vec<usize> = last.results.iter().map(|r| r.index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
    assert!(last.results.iter().all(|r| r.status == ItemStatus::Completed && r.value == Some(r.index)));
}

#[tokio::test]
async fn test_single_item_without_scheduling_bypasses_progress() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (executor, snapshots) = recording_executor(0, 0);

    let counter = calls.clone();
    let results = executor
        .run(vec![21usize], move |item, index| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                assert_eq!(index, 0);
                Ok(item * 2)
            }
        })
        .await
        .expect("item succeeds");

    assert_eq!(results, vec![42]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(snapshots.lock().unwrap().is_empty(), "no progress machinery for a single plain call");
}

#[tokio::test]
async fn test_single_item_with_chunking_reports_progress() {
    let (executor, snapshots) = recording_executor(5, 0);

    let results = executor
        .run(vec![7usize], |item, _| async move { Ok(item) })
        .await
        .expect("item succeeds");

    assert_eq!(results, vec![7]);
    let snapshots = snapshots.lock().unwrap();
    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots[2].completed, 1);
}

#[tokio::test]
async fn test_executor_is_reusable_across_runs() {
    let (executor, snapshots) = recording_executor(2, 0);

    for round in 0..2usize {
        let results = executor
            .run(vec![round; 3], |item, index| async move { Ok(item + index) })
            .await
            .expect("run succeeds");
        assert_eq!(results, vec![round, round + 1, round + 2]);
    }

    let snapshots = snapshots.lock().unwrap();
    let finished = snapshots.iter().filter(|s| s.is_finished()).count();
    // each run ends with a settle snapshot and a closing snapshot at 3/3
    assert_eq!(finished, 4);
}
