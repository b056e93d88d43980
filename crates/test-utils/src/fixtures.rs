//! Raster fixtures on disk.
//!
//! [`RasterFixture`] owns a temporary directory and writes header + data
//! pairs into it in any interleave, data type and byte order, so readers
//! and the full pipeline can be tested against real files.

use std::path::{Path, PathBuf};

use envi_raster::{
    ByteOrder, DataType, EnviHeader, GridSource, Interleave, MemoryGrid, RasterLayout,
};
use tempfile::TempDir;

use crate::generators::SyntheticScene;

/// Paths of a scene written by [`RasterFixture::write_scene`].
#[derive(Debug, Clone)]
pub struct ScenePaths {
    pub reference_state: PathBuf,
    pub reference_locations: PathBuf,
    pub input_locations: PathBuf,
    pub segmentation: Option<PathBuf>,
    pub output: PathBuf,
}

/// Temporary directory of rasters, removed on drop.
#[derive(Debug)]
pub struct RasterFixture {
    dir: TempDir,
}

impl RasterFixture {
    /// Create an empty fixture directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Directory holding the rasters.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a raster named `name` inside the fixture.
    pub fn raster_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `grid` as little-endian `f32` BIL.
    pub fn write_grid(&self, name: &str, grid: &MemoryGrid) -> PathBuf {
        self.write_grid_as(
            name,
            grid,
            DataType::F32,
            Interleave::Bil,
            ByteOrder::LittleEndian,
        )
    }

    /// Write `grid` with an explicit element type, interleave and byte order.
    ///
    /// Returns the data file path; the header sits next to it as `<name>.hdr`.
    pub fn write_grid_as(
        &self,
        name: &str,
        grid: &MemoryGrid,
        data_type: DataType,
        interleave: Interleave,
        byte_order: ByteOrder,
    ) -> PathBuf {
        let shape = grid.shape();
        let mut header = EnviHeader::new(shape.lines, shape.samples, shape.bands, data_type);
        header.set("interleave", interleave.as_str());
        header.set(
            "byte order",
            if byte_order == ByteOrder::BigEndian { "1" } else { "0" },
        );
        let band_names = grid.band_names();
        header.set_list("band names", band_names.as_slice());

        let path = self.raster_path(name);
        header
            .write(envi_raster::header_path(&path))
            .expect("write header");

        let layout = RasterLayout::from_header(&header).expect("fixture layout");
        let size = data_type.size();
        let mut bytes = vec![0u8; layout.file_len() as usize];
        for row in 0..shape.lines {
            for col in 0..shape.samples {
                for band in 0..shape.bands {
                    let value = grid.get(row, col, band).expect("pixel in range");
                    let offset = layout.byte_offset(row, band, col) as usize;
                    data_type.encode(value, byte_order, &mut bytes[offset..offset + size]);
                }
            }
        }
        std::fs::write(&path, bytes).expect("write raster data");
        path
    }

    /// Write every grid of a scene; the output path is reserved but not created.
    pub fn write_scene(&self, scene: &SyntheticScene) -> ScenePaths {
        ScenePaths {
            reference_state: self.write_grid("subs_state", &scene.reference_state),
            reference_locations: self.write_grid_as(
                "subs_loc",
                &scene.reference_locations,
                DataType::F64,
                Interleave::Bil,
                ByteOrder::LittleEndian,
            ),
            input_locations: self.write_grid_as(
                "loc",
                &scene.input_locations,
                DataType::F64,
                Interleave::Bil,
                ByteOrder::LittleEndian,
            ),
            segmentation: scene.segmentation.as_ref().map(|labels| {
                self.write_grid_as(
                    "lbl",
                    labels,
                    DataType::I32,
                    Interleave::Bil,
                    ByteOrder::LittleEndian,
                )
            }),
            output: self.raster_path("atm_interp"),
        }
    }
}

/// Read every pixel of `grid`, pixel-major (`lines * samples * bands` values).
pub fn read_pixels(grid: &dyn GridSource) -> Vec<f64> {
    let shape = grid.shape();
    let mut out = vec![0.0; shape.elements()];
    if shape.row_len() > 0 {
        for (row, chunk) in out.chunks_exact_mut(shape.row_len()).enumerate() {
            grid.read_row(row, chunk).expect("read raster row");
        }
    }
    out
}

impl Default for RasterFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::SceneBuilder;
    use envi_raster::{EnviRaster, RasterShape};

    #[test]
    fn test_written_grid_reads_back() {
        let fixture = RasterFixture::new();
        let grid = MemoryGrid::new(
            RasterShape::new(2, 3, 2),
            (0..12).map(|v| v as f64).collect(),
        )
        .unwrap();

        for (i, interleave) in [Interleave::Bil, Interleave::Bip, Interleave::Bsq]
            .into_iter()
            .enumerate()
        {
            let path = fixture.write_grid_as(
                &format!("grid{}", i),
                &grid,
                DataType::I16,
                interleave,
                ByteOrder::BigEndian,
            );
            let raster = EnviRaster::open(&path).unwrap();
            assert_eq!(read_pixels(&raster), grid.data());
        }
    }

    #[test]
    fn test_write_scene() {
        let fixture = RasterFixture::new();
        let scene = SceneBuilder::new().segments(2).build();
        let paths = fixture.write_scene(&scene);

        assert!(paths.reference_state.exists());
        assert!(paths.segmentation.as_ref().unwrap().exists());
        assert!(!paths.output.exists());

        let state = EnviRaster::open(&paths.reference_state).unwrap();
        assert_eq!(state.band_names(), scene.reference_state.band_names());
    }
}
