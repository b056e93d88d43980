//! End-to-end interpolation run.

use std::path::PathBuf;
use std::time::Instant;

use envi_raster::{
    create_raster, BilChunkWriter, DataType, EnviHeader, EnviRaster, GridSource, Interleave,
    MemoryGrid, RasterShape,
};
use serde::{Deserialize, Serialize};

use crate::config::InterpolationConfig;
use crate::error::{InterpolationError, Result};
use crate::events::{InterpolationEvent, ProgressSink};
use crate::index::SpatialIndex;
use crate::output::{MemoryOutput, RowWriter};
use crate::reference::ReferenceGrid;
use crate::scheduler::{dispatch, partition_rows};
use crate::smoother::Smoother;
use crate::types::{ChunkStats, RunSummary};
use crate::worker::{ChunkWorker, WorkerInputs};

/// Description written to every output header.
pub const OUTPUT_DESCRIPTION: &str = "Interpolated atmospheric state";

/// Per-band list fields that no longer line up once bands are filtered.
const PER_BAND_FIELDS: &[&str] = &[
    "wavelength",
    "fwhm",
    "bbl",
    "data gain values",
    "data offset values",
    "default bands",
];

/// Files taking part in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationPaths {
    /// Reference atmospheric state (and reflectance) raster.
    pub reference_state: PathBuf,
    /// `(lat, lon, elev)` of every reference pixel.
    pub reference_locations: PathBuf,
    /// `(lat, lon, elev)` of every target pixel.
    pub input_locations: PathBuf,
    /// Optional per-target-pixel label raster.
    pub segmentation: Option<PathBuf>,
    /// Output raster, created or replaced.
    pub output: PathBuf,
}

/// Check that reference and target geolocation carry the same bands.
pub fn validate_locations(
    reference_locations: &dyn GridSource,
    input_locations: &dyn GridSource,
) -> Result<()> {
    let reference = reference_locations.shape().bands;
    let target = input_locations.shape().bands;
    if reference != target {
        return Err(InterpolationError::input_shape(
            "input locations",
            format!("{} bands but reference locations have {}", target, reference),
        ));
    }
    if target < 3 {
        return Err(InterpolationError::input_shape(
            "input locations",
            format!("{} bands, need lat, lon and elevation", target),
        ));
    }
    Ok(())
}

/// Output header derived from the reference state header.
///
/// Metadata of the reference is kept, except geometry, layout and the
/// per-band fields, which describe the output instead.
pub fn output_header(
    reference: &EnviHeader,
    band_names: &[String],
    lines: usize,
    samples: usize,
    nodata_value: f64,
) -> Result<EnviHeader> {
    let data_type = match reference.data_type()? {
        dt if dt.is_float() => dt,
        _ => DataType::F32,
    };

    let mut header = reference.clone();
    for field in PER_BAND_FIELDS {
        header.remove(field);
    }
    header.set("lines", lines.to_string());
    header.set("samples", samples.to_string());
    header.set("bands", band_names.len().to_string());
    header.set("interleave", Interleave::Bil.as_str());
    header.set("data type", data_type.code().to_string());
    header.set("byte order", "0");
    header.set("header offset", "0");
    header.set("description", format!("{{{}}}", OUTPUT_DESCRIPTION));
    header.set("data ignore value", nodata_value.to_string());
    header.set_list("band names", band_names);
    Ok(header)
}

/// Interpolate atmospheric state from files on disk.
///
/// Validates every input before the output is created, runs the workers,
/// then smooths the output in place.
pub fn atm_interpolation(
    paths: &InterpolationPaths,
    config: &InterpolationConfig,
    sink: &dyn ProgressSink,
) -> Result<RunSummary> {
    config.validate().map_err(InterpolationError::Config)?;
    let started = Instant::now();

    let state = EnviRaster::open(&paths.reference_state)?;
    let reference_locations = EnviRaster::open(&paths.reference_locations)?;
    let locations = EnviRaster::open(&paths.input_locations)?;
    let segmentation = paths
        .segmentation
        .as_ref()
        .map(|path| EnviRaster::open(path))
        .transpose()?;

    validate_locations(&reference_locations, &locations)?;
    let reference = ReferenceGrid::load(&state, &reference_locations, &config.reflectance_prefix)?;
    let index = SpatialIndex::from_reference(&reference);
    let inputs = WorkerInputs {
        reference: &reference,
        index: &index,
        locations: &locations,
        segmentation: segmentation.as_ref().map(|s| s as &dyn GridSource),
    };
    inputs.validate()?;

    let target = locations.shape();
    let header = output_header(
        state.header(),
        reference.band_names(),
        target.lines,
        target.samples,
        config.nodata_value,
    )?;
    create_raster(&paths.output, &header)?;
    let writer = BilChunkWriter::open(&paths.output)?;

    let (workers, stats) = run_workers(inputs, config, &writer, sink)?;
    writer.flush()?;
    drop(writer);

    let smoother = Smoother::new(config.smoothing_sigma, config.nodata_value);
    smoother.smooth_raster(&paths.output, sink)?;

    let summary = RunSummary {
        lines: target.lines,
        samples: target.samples,
        bands: reference.n_bands(),
        band_names: reference.band_names().to_vec(),
        workers,
        stats,
        smoothed: smoother.is_enabled(),
        elapsed: started.elapsed(),
    };
    sink.emit(&InterpolationEvent::RunFinished {
        summary: summary.clone(),
    });
    Ok(summary)
}

/// Interpolate grids held by any [`GridSource`], returning the result in
/// memory, pixel-major, smoothed when enabled.
pub fn interpolate(
    reference_state: &dyn GridSource,
    reference_locations: &dyn GridSource,
    input_locations: &dyn GridSource,
    segmentation: Option<&dyn GridSource>,
    config: &InterpolationConfig,
    sink: &dyn ProgressSink,
) -> Result<(MemoryGrid, RunSummary)> {
    config.validate().map_err(InterpolationError::Config)?;
    let started = Instant::now();

    validate_locations(reference_locations, input_locations)?;
    let reference =
        ReferenceGrid::load(reference_state, reference_locations, &config.reflectance_prefix)?;
    let index = SpatialIndex::from_reference(&reference);
    let inputs = WorkerInputs {
        reference: &reference,
        index: &index,
        locations: input_locations,
        segmentation,
    };
    inputs.validate()?;

    let target = input_locations.shape();
    let shape = RasterShape::new(target.lines, target.samples, reference.n_bands());
    let output = MemoryOutput::new(shape);
    let (workers, stats) = run_workers(inputs, config, &output, sink)?;

    let mut data = output.into_pixels();
    let smoother = Smoother::new(config.smoothing_sigma, config.nodata_value);
    smoother.smooth_pixels(&mut data, shape, sink);
    let grid = MemoryGrid::new(shape, data)?.with_band_names(reference.band_names().to_vec())?;

    let summary = RunSummary {
        lines: target.lines,
        samples: target.samples,
        bands: reference.n_bands(),
        band_names: reference.band_names().to_vec(),
        workers,
        stats,
        smoothed: smoother.is_enabled(),
        elapsed: started.elapsed(),
    };
    sink.emit(&InterpolationEvent::RunFinished {
        summary: summary.clone(),
    });
    Ok((grid, summary))
}

/// Partition the target rows and run one worker per range.
fn run_workers(
    inputs: WorkerInputs<'_>,
    config: &InterpolationConfig,
    writer: &dyn RowWriter,
    sink: &dyn ProgressSink,
) -> Result<(usize, ChunkStats)> {
    let target = inputs.locations.shape();
    let expected = RasterShape::new(target.lines, target.samples, inputs.reference.n_bands());
    if writer.shape() != expected {
        return Err(InterpolationError::input_shape(
            "output",
            format!(
                "{}x{}x{} but the run produces {}x{}x{}",
                writer.shape().lines,
                writer.shape().samples,
                writer.shape().bands,
                expected.lines,
                expected.samples,
                expected.bands
            ),
        ));
    }

    let ranges = partition_rows(target.lines, config.resolve_workers(target.lines));
    sink.emit(&InterpolationEvent::RunStarted {
        lines: target.lines,
        samples: target.samples,
        bands: expected.bands,
        references: inputs.reference.len(),
        workers: ranges.len(),
    });

    let started = Instant::now();
    let per_range = dispatch(&ranges, ranges.len(), |range| {
        ChunkWorker::new(inputs, config, sink).process(range, writer)
    })?;

    let mut stats = ChunkStats::default();
    for s in &per_range {
        stats.merge(s);
    }
    sink.emit(&InterpolationEvent::DispatchFinished {
        workers: ranges.len(),
        elapsed: started.elapsed(),
    });
    Ok((ranges.len(), stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_header_filters_per_band_metadata() {
        let text = "ENVI\n\
            description = {Retrieved surface and atmosphere state}\n\
            samples = 3\n\
            lines = 2\n\
            bands = 4\n\
            header offset = 128\n\
            data type = 2\n\
            interleave = bip\n\
            byte order = 1\n\
            map info = {UTM, 1, 1, 500000, 4000000, 5, 5, 11, North}\n\
            wavelength = {400, 410, 420, 430}\n\
            band names = {RFL_400, RFL_410, AOT550, H2OSTR}\n";
        let reference = EnviHeader::parse(text, "state.hdr").unwrap();
        let names = vec!["AOT550".to_string(), "H2OSTR".to_string()];
        let header = output_header(&reference, &names, 100, 50, -9999.0).unwrap();

        assert_eq!(header.lines().unwrap(), 100);
        assert_eq!(header.samples().unwrap(), 50);
        assert_eq!(header.bands().unwrap(), 2);
        assert_eq!(header.interleave().unwrap(), Interleave::Bil);
        assert_eq!(header.data_type().unwrap(), DataType::F32);
        assert_eq!(header.header_offset().unwrap(), 0);
        assert_eq!(header.band_names().unwrap(), names);
        assert_eq!(header.data_ignore_value(), Some(-9999.0));
        assert_eq!(header.get("description"), Some("{Interpolated atmospheric state}"));
        assert!(header.get("wavelength").is_none());
        assert!(header.get("map info").is_some());
    }

    #[test]
    fn test_output_header_keeps_float_type() {
        let reference = EnviHeader::new(1, 1, 1, DataType::F64);
        let header = output_header(&reference, &["H2OSTR".to_string()], 1, 1, -1.0).unwrap();
        assert_eq!(header.data_type().unwrap(), DataType::F64);
    }

    #[test]
    fn test_validate_locations() {
        let three = MemoryGrid::new(RasterShape::new(1, 1, 3), vec![0.0; 3]).unwrap();
        let four = MemoryGrid::new(RasterShape::new(1, 1, 4), vec![0.0; 4]).unwrap();
        let two = MemoryGrid::new(RasterShape::new(1, 1, 2), vec![0.0; 2]).unwrap();

        assert!(validate_locations(&three, &three).is_ok());
        assert!(validate_locations(&four, &four).is_ok());
        assert!(validate_locations(&three, &four).is_err());
        assert!(validate_locations(&two, &two).is_err());
    }
}
