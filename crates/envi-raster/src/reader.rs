//! File-backed raster reader.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{RasterError, Result};
use crate::grid::{check_len, GridSource};
use crate::header::{header_path, EnviHeader, Interleave};
use crate::io::read_exact_at;
use crate::layout::{RasterLayout, RasterShape};

/// A header-described flat binary raster opened for reading.
///
/// Reads are positional, so one `EnviRaster` can be shared across threads.
#[derive(Debug)]
pub struct EnviRaster {
    path: PathBuf,
    header: EnviHeader,
    layout: RasterLayout,
    file: File,
}

impl EnviRaster {
    /// Open the raster at `data_path`; the header is found with [`header_path`].
    pub fn open(data_path: impl AsRef<Path>) -> Result<Self> {
        let path = data_path.as_ref().to_path_buf();
        let header = EnviHeader::read(header_path(&path))?;
        Self::open_with_header(path, header)
    }

    /// Open the raster at `data_path` with an already-parsed header.
    pub fn open_with_header(data_path: impl Into<PathBuf>, header: EnviHeader) -> Result<Self> {
        let path = data_path.into();
        let layout = RasterLayout::from_header(&header)?;
        let file = File::open(&path).map_err(|e| RasterError::io(&path, e))?;

        let actual = file
            .metadata()
            .map_err(|e| RasterError::io(&path, e))?
            .len();
        if actual < layout.file_len() {
            return Err(RasterError::invalid_header(
                header.source(),
                format!(
                    "data file {} holds {} bytes, header describes {}",
                    path.display(),
                    actual,
                    layout.file_len()
                ),
            ));
        }

        Ok(Self {
            path,
            header,
            layout,
            file,
        })
    }

    /// Path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed header.
    pub fn header(&self) -> &EnviHeader {
        &self.header
    }

    /// Byte layout.
    pub fn layout(&self) -> &RasterLayout {
        &self.layout
    }

    fn read_bytes(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        read_exact_at(&self.file, &mut buf, offset).map_err(|e| RasterError::io(&self.path, e))?;
        Ok(buf)
    }

    fn decode_into(&self, bytes: &[u8], out: &mut [f64]) {
        let dt = self.layout.data_type;
        let order = self.layout.byte_order;
        for (value, raw) in out.iter_mut().zip(bytes.chunks_exact(dt.size())) {
            *value = dt.decode(raw, order);
        }
    }
}

impl GridSource for EnviRaster {
    fn shape(&self) -> RasterShape {
        self.layout.shape
    }

    fn band_names(&self) -> Vec<String> {
        self.header.band_names().unwrap_or_else(|_| {
            (1..=self.layout.shape.bands)
                .map(|i| format!("Band {}", i))
                .collect()
        })
    }

    fn read_row(&self, row: usize, out: &mut [f64]) -> Result<()> {
        let RasterShape {
            lines,
            samples,
            bands,
        } = self.layout.shape;
        if row >= lines {
            return Err(RasterError::out_of_bounds("row", row, lines));
        }
        check_len(out, samples * bands)?;
        let elem = self.layout.data_type.size();

        match self.layout.interleave {
            Interleave::Bip => {
                let (offset, len) = self.layout.row_block(row, 1)?;
                let bytes = self.read_bytes(offset, len)?;
                self.decode_into(&bytes, out);
            }
            Interleave::Bil => {
                let (offset, len) = self.layout.row_block(row, 1)?;
                let bytes = self.read_bytes(offset, len)?;
                let mut decoded = vec![0.0; samples * bands];
                self.decode_into(&bytes, &mut decoded);
                for band in 0..bands {
                    for col in 0..samples {
                        out[col * bands + band] = decoded[band * samples + col];
                    }
                }
            }
            Interleave::Bsq => {
                let mut decoded = vec![0.0; samples];
                for band in 0..bands {
                    let offset = self.layout.byte_offset(row, band, 0);
                    let bytes = self.read_bytes(offset, samples * elem)?;
                    self.decode_into(&bytes, &mut decoded);
                    for col in 0..samples {
                        out[col * bands + band] = decoded[col];
                    }
                }
            }
        }
        Ok(())
    }

    fn read_pixel(&self, row: usize, col: usize, out: &mut [f64]) -> Result<()> {
        self.layout.check_pixel(row, col)?;
        let bands = self.layout.shape.bands;
        check_len(out, bands)?;
        let elem = self.layout.data_type.size();

        if self.layout.interleave == Interleave::Bip {
            let bytes = self.read_bytes(self.layout.byte_offset(row, 0, col), bands * elem)?;
            self.decode_into(&bytes, out);
        } else {
            for (band, value) in out.iter_mut().enumerate() {
                let bytes = self.read_bytes(self.layout.byte_offset(row, band, col), elem)?;
                *value = self.layout.data_type.decode(&bytes, self.layout.byte_order);
            }
        }
        Ok(())
    }
}
