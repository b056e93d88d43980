//! Destinations for finished output rows.
//!
//! Every worker owns a disjoint row range and writes each row exactly once,
//! straight into the shared destination. Implementations must accept
//! concurrent writes of different rows without locking.

use std::sync::OnceLock;

use envi_raster::{BilChunkWriter, RasterError, RasterShape};

use crate::error::{InterpolationError, Result};

/// Row-addressed output sink.
///
/// `values` holds one row in BIL order: `bands` runs of `samples` values,
/// element `band * samples + col`.
pub trait RowWriter: Send + Sync {
    /// Output dimensions.
    fn shape(&self) -> RasterShape;

    /// Write row `row`.
    fn write_row(&self, row: usize, values: &[f64]) -> Result<()>;
}

impl RowWriter for BilChunkWriter {
    fn shape(&self) -> RasterShape {
        self.layout().shape
    }

    fn write_row(&self, row: usize, values: &[f64]) -> Result<()> {
        self.write_rows(row, values)?;
        Ok(())
    }
}

/// In-memory output where each row can be written once.
///
/// Rows never written read back as zeros, like a freshly allocated raster.
#[derive(Debug)]
pub struct MemoryOutput {
    shape: RasterShape,
    rows: Vec<OnceLock<Vec<f64>>>,
}

impl MemoryOutput {
    /// Create an empty output.
    pub fn new(shape: RasterShape) -> Self {
        Self {
            shape,
            rows: (0..shape.lines).map(|_| OnceLock::new()).collect(),
        }
    }

    /// A written row, in BIL order.
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        self.rows.get(row)?.get().map(Vec::as_slice)
    }

    /// Number of rows written so far.
    pub fn rows_written(&self) -> usize {
        self.rows.iter().filter(|r| r.get().is_some()).count()
    }

    /// Output dimensions.
    pub fn shape(&self) -> RasterShape {
        self.shape
    }

    /// Take the values out, pixel-major (`(row * samples + col) * bands + band`).
    pub fn into_pixels(self) -> Vec<f64> {
        let RasterShape {
            samples, bands, ..
        } = self.shape;
        let mut data = vec![0.0; self.shape.elements()];
        for (r, row) in self.rows.into_iter().enumerate() {
            let Some(row) = row.into_inner() else {
                continue;
            };
            let pixels = &mut data[r * samples * bands..(r + 1) * samples * bands];
            for band in 0..bands {
                for col in 0..samples {
                    pixels[col * bands + band] = row[band * samples + col];
                }
            }
        }
        data
    }
}

impl RowWriter for MemoryOutput {
    fn shape(&self) -> RasterShape {
        MemoryOutput::shape(self)
    }

    fn write_row(&self, row: usize, values: &[f64]) -> Result<()> {
        let slot = self
            .rows
            .get(row)
            .ok_or_else(|| RasterError::out_of_bounds("row", row, self.shape.lines))?;
        if values.len() != self.shape.row_len() {
            return Err(RasterError::BufferMismatch {
                expected: self.shape.row_len(),
                actual: values.len(),
            }
            .into());
        }
        slot.set(values.to_vec())
            .map_err(|_| InterpolationError::RowWrittenTwice { row })
    }
}
