//! Synthetic scene generators.
//!
//! These create predictable reference and target grids whose atmospheric
//! state is an exact plane (or a plane plus a known perturbation), so the
//! expected interpolation result can be computed by hand.

use envi_raster::{MemoryGrid, RasterShape};

/// Nodata sentinel used by the generated scenes.
pub const NODATA: f64 = -9999.0;

/// Atmospheric band names used by generated scenes, in order.
pub const ATM_BAND_NAMES: [&str; 4] = ["AOT550", "H2OSTR", "GNDALT", "SURF_PRES"];

/// Creates a pixel-major `(lat, lon, elev)` location grid.
///
/// Pixel `(row, col)` sits at `origin + (row * step.0, col * step.1)`
/// degrees with constant elevation.
///
/// # Example
///
/// ```
/// use test_utils::create_location_grid;
///
/// let grid = create_location_grid(2, 3, (10.0, 20.0), (0.5, 0.25), 100.0);
/// assert_eq!(grid.len(), 2 * 3 * 3);
/// assert_eq!(&grid[3..6], &[10.0, 20.25, 100.0]);   // row 0, col 1
/// assert_eq!(&grid[9..12], &[10.5, 20.0, 100.0]);   // row 1, col 0
/// ```
pub fn create_location_grid(
    lines: usize,
    samples: usize,
    origin: (f64, f64),
    step: (f64, f64),
    elev: f64,
) -> Vec<f64> {
    let mut data = Vec::with_capacity(lines * samples * 3);
    for row in 0..lines {
        for col in 0..samples {
            data.push(origin.0 + row as f64 * step.0);
            data.push(origin.1 + col as f64 * step.1);
            data.push(elev);
        }
    }
    data
}

/// Deterministic pseudo-random locations inside a lat/lon box.
///
/// Uses a fixed LCG so the same `seed` always gives the same points.
pub fn create_scattered_locations(
    n: usize,
    lat_range: (f64, f64),
    lon_range: (f64, f64),
    seed: u64,
) -> Vec<[f64; 3]> {
    let mut state = seed ^ 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..n)
        .map(|_| {
            [
                lat_range.0 + next() * (lat_range.1 - lat_range.0),
                lon_range.0 + next() * (lon_range.1 - lon_range.0),
                next() * 500.0,
            ]
        })
        .collect()
}

/// One atmospheric band defined as `intercept + lat_coef * lat + lon_coef * lon`
/// with lat/lon in degrees relative to the scene origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneBand {
    pub intercept: f64,
    pub lat_coef: f64,
    pub lon_coef: f64,
}

impl PlaneBand {
    pub const fn new(intercept: f64, lat_coef: f64, lon_coef: f64) -> Self {
        Self {
            intercept,
            lat_coef,
            lon_coef,
        }
    }

    /// Value at a `(lat, lon)` offset in degrees.
    pub fn at(&self, lat: f64, lon: f64) -> f64 {
        self.intercept + self.lat_coef * lat + self.lon_coef * lon
    }
}

/// Reference and target grids for an interpolation test.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub reference_state: MemoryGrid,
    pub reference_locations: MemoryGrid,
    pub input_locations: MemoryGrid,
    pub segmentation: Option<MemoryGrid>,
    pub planes: Vec<PlaneBand>,
    pub origin: (f64, f64),
}

impl SyntheticScene {
    /// Expected state of every atmospheric band at a raw location.
    pub fn expected_at(&self, location: &[f64]) -> Vec<f64> {
        self.planes
            .iter()
            .map(|p| p.at(location[0] - self.origin.0, location[1] - self.origin.1))
            .collect()
    }
}

/// Builder for [`SyntheticScene`].
///
/// The reference grid is a regular lattice; its state carries one band per
/// plane plus `reflectance_bands` `RFL_*` bands that the interpolation must
/// ignore. The target grid covers the same area more densely.
#[derive(Debug, Clone)]
pub struct SceneBuilder {
    reference_shape: (usize, usize),
    target_shape: (usize, usize),
    origin: (f64, f64),
    extent: (f64, f64),
    elevation: f64,
    planes: Vec<PlaneBand>,
    reflectance_bands: usize,
    nodata_pixels: Vec<(usize, usize)>,
    segments: Option<usize>,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self {
            reference_shape: (6, 6),
            target_shape: (12, 10),
            origin: (0.0, 0.0),
            extent: (5e-4, 5e-4),
            elevation: 250.0,
            planes: vec![
                PlaneBand::new(0.1, 200.0, 100.0),
                PlaneBand::new(1.5, -300.0, 500.0),
            ],
            reflectance_bands: 2,
            nodata_pixels: Vec::new(),
            segments: None,
        }
    }
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference lattice size.
    pub fn reference_shape(mut self, lines: usize, samples: usize) -> Self {
        self.reference_shape = (lines, samples);
        self
    }

    /// Target grid size.
    pub fn target_shape(mut self, lines: usize, samples: usize) -> Self {
        self.target_shape = (lines, samples);
        self
    }

    /// South-west corner in degrees.
    pub fn origin(mut self, lat: f64, lon: f64) -> Self {
        self.origin = (lat, lon);
        self
    }

    /// Covered lat/lon span in degrees.
    pub fn extent(mut self, dlat: f64, dlon: f64) -> Self {
        self.extent = (dlat, dlon);
        self
    }

    /// Constant terrain elevation in meters.
    pub fn elevation(mut self, meters: f64) -> Self {
        self.elevation = meters;
        self
    }

    /// Atmospheric bands.
    pub fn planes(mut self, planes: Vec<PlaneBand>) -> Self {
        self.planes = planes;
        self
    }

    /// Number of `RFL_*` bands mixed into the reference state.
    pub fn reflectance_bands(mut self, n: usize) -> Self {
        self.reflectance_bands = n;
        self
    }

    /// Mark a target pixel as nodata.
    pub fn nodata_pixel(mut self, row: usize, col: usize) -> Self {
        self.nodata_pixels.push((row, col));
        self
    }

    /// Add a segmentation grid of horizontal stripes, `n` labels.
    pub fn segments(mut self, n: usize) -> Self {
        self.segments = Some(n);
        self
    }

    pub fn build(self) -> SyntheticScene {
        let (ref_lines, ref_samples) = self.reference_shape;
        let (lines, samples) = self.target_shape;
        let ref_step = (
            self.extent.0 / (ref_lines.max(2) - 1) as f64,
            self.extent.1 / (ref_samples.max(2) - 1) as f64,
        );
        let target_step = (
            self.extent.0 / (lines.max(2) - 1) as f64,
            self.extent.1 / (samples.max(2) - 1) as f64,
        );

        let reference_locations =
            create_location_grid(ref_lines, ref_samples, self.origin, ref_step, self.elevation);

        // reflectance bands first, then atmosphere, like a retrieval state file
        let mut names: Vec<String> = (0..self.reflectance_bands)
            .map(|i| format!("RFL_{}", 400 + 10 * i))
            .collect();
        names.extend(
            (0..self.planes.len())
                .map(|i| ATM_BAND_NAMES.get(i).map_or(format!("ATM_{}", i), |s| s.to_string())),
        );

        let mut state = Vec::with_capacity(ref_lines * ref_samples * names.len());
        for location in reference_locations.chunks_exact(3) {
            for i in 0..self.reflectance_bands {
                state.push(0.05 * (i + 1) as f64);
            }
            for plane in &self.planes {
                state.push(plane.at(location[0] - self.origin.0, location[1] - self.origin.1));
            }
        }

        let mut input_locations =
            create_location_grid(lines, samples, self.origin, target_step, self.elevation);
        for &(row, col) in &self.nodata_pixels {
            let i = (row * samples + col) * 3;
            input_locations[i..i + 3].fill(NODATA);
        }

        let segmentation = self.segments.map(|n| {
            let labels = (0..lines * samples)
                .map(|p| ((p / samples) * n / lines.max(1)) as f64)
                .collect();
            MemoryGrid::from_band(lines, samples, labels).expect("label grid shape")
        });

        SyntheticScene {
            reference_state: MemoryGrid::new(
                RasterShape::new(ref_lines, ref_samples, names.len()),
                state,
            )
            .and_then(|g| g.with_band_names(names))
            .expect("reference state shape"),
            reference_locations: MemoryGrid::new(
                RasterShape::new(ref_lines, ref_samples, 3),
                reference_locations,
            )
            .expect("reference location shape"),
            input_locations: MemoryGrid::new(RasterShape::new(lines, samples, 3), input_locations)
                .expect("input location shape"),
            segmentation,
            planes: self.planes,
            origin: self.origin,
        }
    }
}
