//! Random-access grid capability.
//!
//! Consumers that only need "give me row `r`" or "give me pixel `(r, c)`"
//! depend on [`GridSource`] rather than on a particular file format, so the
//! same code runs against an on-disk raster or an in-memory grid.

use crate::error::{RasterError, Result};
use crate::layout::RasterShape;

/// Read-only random access to a `lines x samples x bands` grid.
///
/// Rows and pixels are returned pixel-major: element `col * bands + band`.
/// Implementations must be usable from several threads at once.
pub trait GridSource: Send + Sync {
    /// Grid dimensions.
    fn shape(&self) -> RasterShape;

    /// Band names, one per band.
    fn band_names(&self) -> Vec<String>;

    /// Read one row into `out` (`samples * bands` values).
    fn read_row(&self, row: usize, out: &mut [f64]) -> Result<()>;

    /// Read one pixel into `out` (`bands` values).
    fn read_pixel(&self, row: usize, col: usize, out: &mut [f64]) -> Result<()> {
        let shape = self.shape();
        if col >= shape.samples {
            return Err(RasterError::out_of_bounds("column", col, shape.samples));
        }
        check_len(out, shape.bands)?;
        let mut buf = vec![0.0; shape.row_len()];
        self.read_row(row, &mut buf)?;
        out.copy_from_slice(&buf[col * shape.bands..(col + 1) * shape.bands]);
        Ok(())
    }

    /// Read a whole band as a row-major `lines * samples` vector.
    fn read_band(&self, band: usize) -> Result<Vec<f64>> {
        let shape = self.shape();
        if band >= shape.bands {
            return Err(RasterError::out_of_bounds("band", band, shape.bands));
        }
        let mut row = vec![0.0; shape.row_len()];
        let mut out = Vec::with_capacity(shape.pixels());
        for r in 0..shape.lines {
            self.read_row(r, &mut row)?;
            out.extend(row.chunks_exact(shape.bands).map(|px| px[band]));
        }
        Ok(out)
    }
}

pub(crate) fn check_len(buf: &[f64], expected: usize) -> Result<()> {
    if buf.len() != expected {
        return Err(RasterError::BufferMismatch {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Grid held entirely in memory, pixel-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryGrid {
    shape: RasterShape,
    data: Vec<f64>,
    band_names: Vec<String>,
}

impl MemoryGrid {
    /// Create a grid from pixel-major data.
    pub fn new(shape: RasterShape, data: Vec<f64>) -> Result<Self> {
        check_len(&data, shape.elements())?;
        let band_names = (1..=shape.bands).map(|i| format!("Band {}", i)).collect();
        Ok(Self {
            shape,
            data,
            band_names,
        })
    }

    /// Replace the band names.
    pub fn with_band_names<S: Into<String>>(mut self, names: Vec<S>) -> Result<Self> {
        if names.len() != self.shape.bands {
            return Err(RasterError::BufferMismatch {
                expected: self.shape.bands,
                actual: names.len(),
            });
        }
        self.band_names = names.into_iter().map(Into::into).collect();
        Ok(self)
    }

    /// Build a single-band grid from row-major values.
    pub fn from_band(lines: usize, samples: usize, values: Vec<f64>) -> Result<Self> {
        Self::new(RasterShape::new(lines, samples, 1), values)
    }

    /// Value at `(row, col, band)`.
    pub fn get(&self, row: usize, col: usize, band: usize) -> Option<f64> {
        if row >= self.shape.lines || col >= self.shape.samples || band >= self.shape.bands {
            return None;
        }
        self.data
            .get((row * self.shape.samples + col) * self.shape.bands + band)
            .copied()
    }

    /// Underlying pixel-major data.
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

impl GridSource for MemoryGrid {
    fn shape(&self) -> RasterShape {
        self.shape
    }

    fn band_names(&self) -> Vec<String> {
        self.band_names.clone()
    }

    fn read_row(&self, row: usize, out: &mut [f64]) -> Result<()> {
        if row >= self.shape.lines {
            return Err(RasterError::out_of_bounds("row", row, self.shape.lines));
        }
        check_len(out, self.shape.row_len())?;
        let start = row * self.shape.row_len();
        out.copy_from_slice(&self.data[start..start + self.shape.row_len()]);
        Ok(())
    }
}
