//! Core types for atmospheric interpolation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Anisotropic coordinate scaling applied before neighbor search.
///
/// Roughly 100 km per degree of latitude and 1 m of elevation weighted like
/// 10 m of horizontal distance.
pub const LOCATION_SCALING: [f64; 3] = [1e6, 1e6, 0.01];

/// A `(lat, lon, elev)` location after [`LOCATION_SCALING`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledCoordinate {
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
}

impl ScaledCoordinate {
    /// Scale a raw `(lat, lon, elev)` location. Extra bands are ignored.
    pub fn from_location(location: &[f64]) -> Self {
        Self {
            lat: location[0] * LOCATION_SCALING[0],
            lon: location[1] * LOCATION_SCALING[1],
            elev: location[2] * LOCATION_SCALING[2],
        }
    }

    /// All three scaled components, the space neighbors are searched in.
    pub fn as_array(&self) -> [f64; 3] {
        [self.lat, self.lon, self.elev]
    }

    /// Regression predictors `[1, lat, lon]`; elevation is not a predictor.
    pub fn predictors(&self) -> [f64; 3] {
        [1.0, self.lat, self.lon]
    }
}

/// Whether every coordinate of `location` equals the nodata sentinel.
///
/// Uses a relative-plus-absolute tolerance of `1e-8 + 1e-5 * |nodata|`.
pub fn is_nodata_location(location: &[f64], nodata: f64) -> bool {
    let tolerance = 1e-8 + 1e-5 * nodata.abs();
    location.iter().all(|v| (v - nodata).abs() <= tolerance)
}

/// Half-open range of target rows `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    pub stop: usize,
}

impl RowRange {
    /// Create a new row range.
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    /// Number of rows in the range.
    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    /// Check if the range is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the rows.
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.stop
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// Counters collected by one chunk worker (or merged across workers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStats {
    /// Pixels that received a model prediction.
    pub pixels: u64,
    /// Pixels passed through as nodata.
    pub nodata_pixels: u64,
    /// Regression models fitted.
    pub fits: u64,
    /// Pixels served by a cached model.
    pub cache_hits: u64,
    /// Band fits that degraded to zero coefficients.
    pub degraded_bands: u64,
}

impl ChunkStats {
    /// Add another worker's counters to these.
    pub fn merge(&mut self, other: &ChunkStats) {
        self.pixels += other.pixels;
        self.nodata_pixels += other.nodata_pixels;
        self.fits += other.fits;
        self.cache_hits += other.cache_hits;
        self.degraded_bands += other.degraded_bands;
    }

    /// Fraction of predicted pixels served from the cache (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        if self.pixels == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.pixels as f64
        }
    }
}

/// Pixels per second, 0 for an empty interval.
pub fn throughput(pixels: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        pixels as f64 / secs
    } else {
        0.0
    }
}

/// Outcome of a complete interpolation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub lines: usize,
    pub samples: usize,
    pub bands: usize,
    pub band_names: Vec<String>,
    pub workers: usize,
    pub stats: ChunkStats,
    pub smoothed: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Overall pixels per second, including nodata pass-through.
    pub fn pixels_per_second(&self) -> f64 {
        throughput((self.lines * self.samples) as u64, self.elapsed)
    }

    /// Pixels per second per worker.
    pub fn pixels_per_second_per_worker(&self) -> f64 {
        if self.workers == 0 {
            0.0
        } else {
            self.pixels_per_second() / self.workers as f64
        }
    }
}
