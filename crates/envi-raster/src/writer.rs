//! Raster creation and lock-free chunked writes.
//!
//! The output raster is allocated once with its final header. Writers then
//! place whole rows at offsets computed from the layout; two writers never
//! touch the same bytes as long as their row ranges are disjoint, so no
//! coordination is needed between them.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RasterError, Result};
use crate::header::{header_path, EnviHeader, Interleave};
use crate::io::write_all_at;
use crate::layout::RasterLayout;

/// Write `header` next to `data_path` and allocate a zero-filled data file.
///
/// Any existing raster at that path is replaced.
pub fn create_raster(data_path: impl AsRef<Path>, header: &EnviHeader) -> Result<RasterLayout> {
    let data_path = data_path.as_ref();
    let layout = RasterLayout::from_header(header)?;

    header.write(header_path(data_path))?;

    let file = File::create(data_path).map_err(|e| RasterError::io(data_path, e))?;
    file.set_len(layout.file_len())
        .map_err(|e| RasterError::io(data_path, e))?;

    debug!(
        path = %data_path.display(),
        lines = layout.shape.lines,
        samples = layout.shape.samples,
        bands = layout.shape.bands,
        bytes = layout.file_len(),
        "Created raster"
    );

    Ok(layout)
}

/// Writes blocks of whole rows into a BIL raster.
///
/// `&BilChunkWriter` is `Sync`: hand the same writer to every worker.
#[derive(Debug)]
pub struct BilChunkWriter {
    path: PathBuf,
    layout: RasterLayout,
    file: File,
}

impl BilChunkWriter {
    /// Open an existing BIL raster for writing.
    pub fn open(data_path: impl AsRef<Path>) -> Result<Self> {
        let path = data_path.as_ref().to_path_buf();
        let header = EnviHeader::read(header_path(&path))?;
        let layout = RasterLayout::from_header(&header)?;
        if layout.interleave != Interleave::Bil {
            return Err(RasterError::InterleaveMismatch {
                expected: "bil",
                actual: layout.interleave.to_string(),
            });
        }
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| RasterError::io(&path, e))?;
        Ok(Self { path, layout, file })
    }

    /// Byte layout of the target raster.
    pub fn layout(&self) -> &RasterLayout {
        &self.layout
    }

    /// Write rows starting at `start_row`.
    ///
    /// `block` holds whole rows in BIL order (`[row][band][sample]`); its
    /// length must be a multiple of `bands * samples`.
    pub fn write_rows(&self, start_row: usize, block: &[f64]) -> Result<()> {
        let row_len = self.layout.shape.row_len();
        if row_len == 0 {
            return Ok(());
        }
        if block.len() % row_len != 0 {
            return Err(RasterError::BufferMismatch {
                expected: (block.len() / row_len + 1) * row_len,
                actual: block.len(),
            });
        }
        let rows = block.len() / row_len;
        let (offset, len) = self.layout.row_block(start_row, rows)?;

        let dt = self.layout.data_type;
        let order = self.layout.byte_order;
        let mut bytes = vec![0u8; len];
        for (value, raw) in block.iter().zip(bytes.chunks_exact_mut(dt.size())) {
            dt.encode(*value, order, raw);
        }

        write_all_at(&self.file, &bytes, offset).map_err(|e| RasterError::io(&self.path, e))
    }

    /// Flush written data to disk.
    pub fn flush(&self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| RasterError::io(&self.path, e))
    }
}
