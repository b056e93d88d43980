//! Byte-offset arithmetic for flat binary rasters.

use crate::error::{RasterError, Result};
use crate::header::{ByteOrder, DataType, EnviHeader, Interleave};

/// Raster dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterShape {
    pub lines: usize,
    pub samples: usize,
    pub bands: usize,
}

impl RasterShape {
    /// Create a new shape.
    pub fn new(lines: usize, samples: usize, bands: usize) -> Self {
        Self {
            lines,
            samples,
            bands,
        }
    }

    /// Total number of pixels (`lines * samples`).
    pub fn pixels(&self) -> usize {
        self.lines * self.samples
    }

    /// Total number of elements (`lines * samples * bands`).
    pub fn elements(&self) -> usize {
        self.pixels() * self.bands
    }

    /// Number of elements in one row across all bands.
    pub fn row_len(&self) -> usize {
        self.samples * self.bands
    }
}

/// Everything needed to locate an element in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterLayout {
    pub shape: RasterShape,
    pub interleave: Interleave,
    pub data_type: DataType,
    pub byte_order: ByteOrder,
    pub header_offset: u64,
}

impl RasterLayout {
    /// Derive the layout from a parsed header.
    pub fn from_header(header: &EnviHeader) -> Result<Self> {
        Ok(Self {
            shape: RasterShape::new(header.lines()?, header.samples()?, header.bands()?),
            interleave: header.interleave()?,
            data_type: header.data_type()?,
            byte_order: header.byte_order()?,
            header_offset: header.header_offset()?,
        })
    }

    /// Element index (not bytes) of `(row, band, col)` in the data stream.
    pub fn element_index(&self, row: usize, band: usize, col: usize) -> usize {
        let RasterShape {
            lines,
            samples,
            bands,
        } = self.shape;
        match self.interleave {
            Interleave::Bil => (row * bands + band) * samples + col,
            Interleave::Bip => (row * samples + col) * bands + band,
            Interleave::Bsq => (band * lines + row) * samples + col,
        }
    }

    /// Byte offset of `(row, band, col)` in the data file.
    pub fn byte_offset(&self, row: usize, band: usize, col: usize) -> u64 {
        self.header_offset
            + (self.element_index(row, band, col) * self.data_type.size()) as u64
    }

    /// Byte offset and length of rows `[start_row, start_row + rows)`.
    ///
    /// Only BIL and BIP store a row as one contiguous block.
    pub fn row_block(&self, start_row: usize, rows: usize) -> Result<(u64, usize)> {
        if self.interleave == Interleave::Bsq {
            return Err(RasterError::InterleaveMismatch {
                expected: "bil or bip",
                actual: self.interleave.to_string(),
            });
        }
        if start_row + rows > self.shape.lines {
            return Err(RasterError::out_of_bounds(
                "row",
                start_row + rows,
                self.shape.lines,
            ));
        }
        let elem = self.data_type.size();
        let offset = self.header_offset + (start_row * self.shape.row_len() * elem) as u64;
        Ok((offset, rows * self.shape.row_len() * elem))
    }

    /// Size of the data file in bytes (including the header offset).
    pub fn file_len(&self) -> u64 {
        self.header_offset + (self.shape.elements() * self.data_type.size()) as u64
    }

    pub(crate) fn check_pixel(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.shape.lines {
            return Err(RasterError::out_of_bounds("row", row, self.shape.lines));
        }
        if col >= self.shape.samples {
            return Err(RasterError::out_of_bounds("column", col, self.shape.samples));
        }
        Ok(())
    }
}
