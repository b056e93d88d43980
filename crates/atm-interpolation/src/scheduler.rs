//! Row-range partitioning and parallel dispatch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::error::{InterpolationError, Result};
use crate::types::{ChunkStats, RowRange};

/// Split `[0, lines)` into `min(n_workers, lines)` contiguous ranges.
///
/// Cut points are `floor(i * lines / n)`, so range sizes differ by at most
/// one row and the ranges cover every row exactly once. No lines means no
/// ranges; a request for zero workers is treated as one.
pub fn partition_rows(lines: usize, n_workers: usize) -> Vec<RowRange> {
    if lines == 0 {
        return Vec::new();
    }
    let n = n_workers.clamp(1, lines);
    (0..n)
        .map(|i| RowRange::new(i * lines / n, (i + 1) * lines / n))
        .collect()
}

/// Run `task` once per range on a dedicated pool of `n_threads` threads.
///
/// Waits for every task. If any task returns an error or panics, the first
/// failure in range order is returned as [`InterpolationError::WorkerFailed`]
/// naming its range; otherwise the per-range stats come back in range order.
pub fn dispatch<F>(ranges: &[RowRange], n_threads: usize, task: F) -> Result<Vec<ChunkStats>>
where
    F: Fn(RowRange) -> Result<ChunkStats> + Sync,
{
    if ranges.is_empty() {
        return Ok(Vec::new());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(n_threads.max(1))
        .thread_name(|i| format!("atm-worker-{}", i))
        .build()
        .map_err(|e| InterpolationError::WorkerPool(e.to_string()))?;

    let results: Vec<Result<ChunkStats>> = pool.install(|| {
        ranges
            .par_iter()
            .with_max_len(1)
            .map(|&range| run_guarded(range, &task))
            .collect()
    });

    results.into_iter().collect()
}

fn run_guarded<F>(range: RowRange, task: &F) -> Result<ChunkStats>
where
    F: Fn(RowRange) -> Result<ChunkStats>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| task(range))) {
        Ok(Ok(stats)) => Ok(stats),
        Ok(Err(e)) => Err(InterpolationError::worker_failed(range, e.to_string())),
        Err(payload) => Err(InterpolationError::worker_failed(
            range,
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
