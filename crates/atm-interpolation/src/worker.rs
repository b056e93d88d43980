//! Per-range interpolation worker.

use std::time::Instant;

use envi_raster::GridSource;

use crate::config::InterpolationConfig;
use crate::error::{InterpolationError, Result};
use crate::events::{InterpolationEvent, ProgressSink};
use crate::index::{Neighbors, SearchBuffer, SpatialIndex};
use crate::output::RowWriter;
use crate::reference::ReferenceGrid;
use crate::regression::{fit_local_model, DegradedBand, RegressionCache};
use crate::types::{is_nodata_location, ChunkStats, RowRange, ScaledCoordinate};

/// Read-only inputs shared by every worker of a run.
#[derive(Clone, Copy)]
pub struct WorkerInputs<'a> {
    pub reference: &'a ReferenceGrid,
    pub index: &'a SpatialIndex,
    /// Target `(lat, lon, elev)` grid.
    pub locations: &'a dyn GridSource,
    /// Optional label grid; band 0 holds the labels.
    pub segmentation: Option<&'a dyn GridSource>,
}

impl WorkerInputs<'_> {
    /// Check that the target and segmentation grids agree with each other
    /// and with the reference.
    pub fn validate(&self) -> Result<()> {
        let target = self.locations.shape();
        if target.bands < 3 {
            return Err(InterpolationError::input_shape(
                "input locations",
                format!("{} bands, need lat, lon and elevation", target.bands),
            ));
        }
        if let Some(seg) = self.segmentation {
            let seg = seg.shape();
            if seg.lines != target.lines || seg.samples != target.samples {
                return Err(InterpolationError::input_shape(
                    "segmentation",
                    format!(
                        "{}x{} but input locations are {}x{}",
                        seg.lines, seg.samples, target.lines, target.samples
                    ),
                ));
            }
            if seg.bands == 0 {
                return Err(InterpolationError::input_shape("segmentation", "no bands"));
            }
        }
        if self.reference.is_empty() || self.index.len() != self.reference.len() {
            return Err(InterpolationError::input_shape(
                "reference",
                format!(
                    "{} reference pixels, {} indexed",
                    self.reference.len(),
                    self.index.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Interpolates one row range at a time.
///
/// A worker owns its regression cache and scratch buffers; it shares only
/// the read-only [`WorkerInputs`] and the output writer with its siblings.
pub struct ChunkWorker<'a> {
    inputs: WorkerInputs<'a>,
    config: &'a InterpolationConfig,
    sink: &'a dyn ProgressSink,
    cache: RegressionCache,
    search: SearchBuffer,
    neighbors: Neighbors,
    degraded: Vec<DegradedBand>,
    location_row: Vec<f64>,
    label_row: Vec<f64>,
    prediction: Vec<f64>,
}

impl<'a> ChunkWorker<'a> {
    /// Create a worker with an empty cache.
    pub fn new(
        inputs: WorkerInputs<'a>,
        config: &'a InterpolationConfig,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        let target = inputs.locations.shape();
        let label_len = inputs.segmentation.map_or(0, |s| s.shape().row_len());
        Self {
            inputs,
            config,
            sink,
            cache: RegressionCache::new(),
            search: SearchBuffer::new(config.nneighbors),
            neighbors: Neighbors::default(),
            degraded: Vec::new(),
            location_row: vec![0.0; target.row_len()],
            label_row: vec![0.0; label_len],
            prediction: vec![0.0; inputs.reference.n_bands()],
        }
    }

    /// Number of values in one output row.
    pub fn row_len(&self) -> usize {
        self.inputs.locations.shape().samples * self.inputs.reference.n_bands()
    }

    /// Interpolate every row of `range` and hand each one to `writer`.
    pub fn process(&mut self, range: RowRange, writer: &dyn RowWriter) -> Result<ChunkStats> {
        let started = Instant::now();
        self.sink.emit(&InterpolationEvent::ChunkStarted { range });

        let samples = self.inputs.locations.shape().samples;
        let mut stats = ChunkStats::default();
        let mut block = vec![0.0; self.row_len()];

        for row in range.rows() {
            let row_started = Instant::now();
            self.process_row(row, &mut block, &mut stats)?;
            writer.write_row(row, &block)?;
            self.sink.emit(&InterpolationEvent::RowFinished {
                row,
                range,
                pixels: samples,
                elapsed: row_started.elapsed(),
            });
        }

        self.sink.emit(&InterpolationEvent::ChunkFinished {
            range,
            stats,
            elapsed: started.elapsed(),
        });
        Ok(stats)
    }

    /// Interpolate one row into `out` (BIL order).
    pub fn process_row(&mut self, row: usize, out: &mut [f64], stats: &mut ChunkStats) -> Result<()> {
        let target = self.inputs.locations.shape();
        let samples = target.samples;
        let n_bands = self.inputs.reference.n_bands();
        let nodata = self.config.nodata_value;

        if out.len() != samples * n_bands {
            return Err(envi_raster::RasterError::BufferMismatch {
                expected: samples * n_bands,
                actual: out.len(),
            }
            .into());
        }

        self.inputs.locations.read_row(row, &mut self.location_row)?;
        let label_bands = match self.inputs.segmentation {
            Some(seg) => {
                seg.read_row(row, &mut self.label_row)?;
                seg.shape().bands
            }
            None => 0,
        };

        for col in 0..samples {
            let location = &self.location_row[col * target.bands..col * target.bands + 3];
            if is_nodata_location(location, nodata) {
                for band in 0..n_bands {
                    out[band * samples + col] = nodata;
                }
                stats.nodata_pixels += 1;
                continue;
            }

            let point = ScaledCoordinate::from_location(location);
            // fractional labels truncate; non-finite labels are fitted per pixel
            let label = (label_bands > 0)
                .then(|| self.label_row[col * label_bands])
                .filter(|v| v.is_finite())
                .map(|v| v as i64);

            self.degraded.clear();
            let (model, hit) = self.cache.get_or_fit(label, || {
                self.inputs.index.query_into(
                    &point.as_array(),
                    self.config.nneighbors,
                    &mut self.search,
                    &mut self.neighbors,
                );
                let fit = fit_local_model(
                    self.inputs.reference,
                    &self.neighbors.ids,
                    self.config.validity_floor,
                );
                self.degraded.extend_from_slice(&fit.degraded);
                fit.model
            });
            model.evaluate(&point, &mut self.prediction);

            for (band, value) in self.prediction.iter().enumerate() {
                out[band * samples + col] = *value;
            }

            stats.pixels += 1;
            if hit {
                stats.cache_hits += 1;
            } else {
                stats.fits += 1;
            }
            stats.degraded_bands += self.degraded.len() as u64;
            for d in &self.degraded {
                self.sink.emit(&InterpolationEvent::FitDegraded {
                    row,
                    col,
                    band: d.band,
                    usable_neighbors: d.usable_neighbors,
                    reason: d.reason,
                });
            }
        }

        Ok(())
    }
}
