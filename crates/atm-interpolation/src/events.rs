//! Progress and diagnostic events.
//!
//! The core never configures logging. It reports what it does as
//! [`InterpolationEvent`]s to a caller-supplied [`ProgressSink`];
//! [`TracingSink`] forwards them to `tracing`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::regression::DegradeReason;
use crate::types::{throughput, ChunkStats, RowRange, RunSummary};

/// Something worth reporting during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationEvent {
    /// Inputs validated, output created, workers about to start.
    RunStarted {
        lines: usize,
        samples: usize,
        bands: usize,
        references: usize,
        workers: usize,
    },
    /// A worker picked up its row range.
    ChunkStarted { range: RowRange },
    /// A worker wrote one row.
    RowFinished {
        row: usize,
        range: RowRange,
        pixels: usize,
        elapsed: Duration,
    },
    /// A band's fit fell back to zero coefficients.
    FitDegraded {
        row: usize,
        col: usize,
        band: usize,
        usable_neighbors: usize,
        reason: DegradeReason,
    },
    /// A worker finished its row range.
    ChunkFinished {
        range: RowRange,
        stats: ChunkStats,
        elapsed: Duration,
    },
    /// Every worker has joined.
    DispatchFinished { workers: usize, elapsed: Duration },
    /// Smoothing disabled by a non-positive sigma.
    SmoothingSkipped { sigma: f64 },
    /// One band smoothed and written back.
    BandSmoothed {
        band: usize,
        /// Nodata pixels that received a value from their neighborhood.
        filled: usize,
        /// Nodata pixels with no valid neighbor in reach, left as nodata.
        unresolved: usize,
    },
    /// The run completed.
    RunFinished { summary: RunSummary },
}

/// Receiver of [`InterpolationEvent`]s, shared by every worker.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &InterpolationEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&InterpolationEvent) + Send + Sync,
{
    fn emit(&self, event: &InterpolationEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: &InterpolationEvent) {}
}

/// Sink that forwards events to `tracing`.
///
/// Per-row and per-fit events go out at debug level, everything else at
/// info.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &InterpolationEvent) {
        match event {
            InterpolationEvent::RunStarted {
                lines,
                samples,
                bands,
                references,
                workers,
            } => info!(
                lines,
                samples,
                bands,
                references,
                workers,
                "Starting atmospheric interpolation"
            ),
            InterpolationEvent::ChunkStarted { range } => {
                info!(range = %range, rows = range.len(), "Worker started")
            }
            InterpolationEvent::RowFinished {
                row,
                range,
                pixels,
                elapsed,
            } => debug!(
                row,
                range = %range,
                pixels_per_sec = throughput(*pixels as u64, *elapsed),
                "Row finished"
            ),
            InterpolationEvent::FitDegraded {
                row,
                col,
                band,
                usable_neighbors,
                reason,
            } => debug!(
                row,
                col,
                band,
                usable_neighbors,
                reason = %reason,
                "Band fit degraded to zero coefficients"
            ),
            InterpolationEvent::ChunkFinished {
                range,
                stats,
                elapsed,
            } => info!(
                range = %range,
                pixels = stats.pixels,
                nodata = stats.nodata_pixels,
                fits = stats.fits,
                cache_hits = stats.cache_hits,
                degraded = stats.degraded_bands,
                elapsed_ms = elapsed.as_millis() as u64,
                pixels_per_sec = throughput(stats.pixels + stats.nodata_pixels, *elapsed),
                "Worker finished"
            ),
            InterpolationEvent::DispatchFinished { workers, elapsed } => info!(
                workers,
                elapsed_ms = elapsed.as_millis() as u64,
                "All workers joined"
            ),
            InterpolationEvent::SmoothingSkipped { sigma } => {
                info!(sigma, "Smoothing disabled")
            }
            InterpolationEvent::BandSmoothed {
                band,
                filled,
                unresolved,
            } => {
                if *unresolved > 0 {
                    warn!(band, filled, unresolved, "Band smoothed, some pixels left as nodata");
                } else {
                    debug!(band, filled, "Band smoothed");
                }
            }
            InterpolationEvent::RunFinished { summary } => info!(
                lines = summary.lines,
                samples = summary.samples,
                bands = summary.bands,
                workers = summary.workers,
                fits = summary.stats.fits,
                cache_hit_rate = summary.stats.hit_rate(),
                elapsed_secs = summary.elapsed.as_secs_f64(),
                pixels_per_sec = summary.pixels_per_second(),
                pixels_per_sec_per_worker = summary.pixels_per_second_per_worker(),
                "Atmospheric interpolation complete"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink_receives_events() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &InterpolationEvent| seen.lock().unwrap().push(event.clone());

        sink.emit(&InterpolationEvent::ChunkStarted {
            range: RowRange::new(0, 4),
        });
        sink.emit(&InterpolationEvent::SmoothingSkipped { sigma: 0.0 });

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            InterpolationEvent::ChunkStarted {
                range: RowRange::new(0, 4)
            }
        );
    }

    #[test]
    fn test_tracing_sink_handles_every_event() {
        let sink = TracingSink;
        let stats = ChunkStats {
            pixels: 4,
            ..Default::default()
        };
        let events = [
            InterpolationEvent::RunStarted {
                lines: 2,
                samples: 2,
                bands: 1,
                references: 10,
                workers: 1,
            },
            InterpolationEvent::RowFinished {
                row: 0,
                range: RowRange::new(0, 2),
                pixels: 2,
                elapsed: Duration::from_millis(1),
            },
            InterpolationEvent::FitDegraded {
                row: 0,
                col: 1,
                band: 0,
                usable_neighbors: 2,
                reason: DegradeReason::TooFewNeighbors,
            },
            InterpolationEvent::ChunkFinished {
                range: RowRange::new(0, 2),
                stats,
                elapsed: Duration::ZERO,
            },
            InterpolationEvent::BandSmoothed {
                band: 0,
                filled: 1,
                unresolved: 1,
            },
        ];
        for event in &events {
            sink.emit(event);
            NullSink.emit(event);
        }
    }
}
