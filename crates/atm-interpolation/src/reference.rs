//! Reference grid loading.

use envi_raster::GridSource;

use crate::error::{InterpolationError, Result};
use crate::types::ScaledCoordinate;

/// Indices of the bands whose name does not start with `reflectance_prefix`.
pub fn atmospheric_bands(band_names: &[String], reflectance_prefix: &str) -> Vec<usize> {
    band_names
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.starts_with(reflectance_prefix))
        .map(|(i, _)| i)
        .collect()
}

/// Reference pixels: scaled locations plus atmosphere-only state vectors.
///
/// Pixels are flattened row-major; `location(i)` and `state(i)` describe the
/// same reference pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGrid {
    locations: Vec<ScaledCoordinate>,
    state: Vec<f64>,
    band_names: Vec<String>,
}

impl ReferenceGrid {
    /// Build from raw `(lat, lon, elev)` locations and per-pixel state vectors.
    pub fn new(
        locations: &[[f64; 3]],
        state: Vec<Vec<f64>>,
        band_names: Vec<String>,
    ) -> Result<Self> {
        if locations.len() != state.len() {
            return Err(InterpolationError::input_shape(
                "reference",
                format!(
                    "{} locations but {} state vectors",
                    locations.len(),
                    state.len()
                ),
            ));
        }
        let n_bands = band_names.len();
        if let Some(bad) = state.iter().position(|s| s.len() != n_bands) {
            return Err(InterpolationError::input_shape(
                "reference",
                format!(
                    "state vector {} has {} bands, expected {}",
                    bad,
                    state[bad].len(),
                    n_bands
                ),
            ));
        }

        Ok(Self {
            locations: locations
                .iter()
                .map(|l| ScaledCoordinate::from_location(l))
                .collect(),
            state: state.into_iter().flatten().collect(),
            band_names,
        })
    }

    /// Load from reference state and reference location rasters.
    ///
    /// Only the atmospheric bands (see [`atmospheric_bands`]) of the state
    /// raster are kept. The location raster must supply `(lat, lon, elev)`
    /// in its first three bands.
    pub fn load(
        state: &dyn GridSource,
        locations: &dyn GridSource,
        reflectance_prefix: &str,
    ) -> Result<Self> {
        let state_shape = state.shape();
        let loc_shape = locations.shape();

        if state_shape.pixels() != loc_shape.pixels() {
            return Err(InterpolationError::input_shape(
                "reference locations",
                format!(
                    "{} pixels ({}x{}) but reference state has {} ({}x{})",
                    loc_shape.pixels(),
                    loc_shape.lines,
                    loc_shape.samples,
                    state_shape.pixels(),
                    state_shape.lines,
                    state_shape.samples
                ),
            ));
        }
        if loc_shape.bands < 3 {
            return Err(InterpolationError::input_shape(
                "reference locations",
                format!("{} bands, need lat, lon and elevation", loc_shape.bands),
            ));
        }

        let names = state.band_names();
        let atm = atmospheric_bands(&names, reflectance_prefix);
        if atm.is_empty() {
            return Err(InterpolationError::input_shape(
                "reference state",
                format!("no band without the '{}' prefix", reflectance_prefix),
            ));
        }

        let n = state_shape.pixels();
        let mut scaled = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n * atm.len());

        let mut loc_row = vec![0.0; loc_shape.row_len()];
        for row in 0..loc_shape.lines {
            locations.read_row(row, &mut loc_row)?;
            scaled.extend(
                loc_row
                    .chunks_exact(loc_shape.bands)
                    .map(ScaledCoordinate::from_location),
            );
        }

        let mut state_row = vec![0.0; state_shape.row_len()];
        for row in 0..state_shape.lines {
            state.read_row(row, &mut state_row)?;
            for pixel in state_row.chunks_exact(state_shape.bands) {
                values.extend(atm.iter().map(|&b| pixel[b]));
            }
        }

        Ok(Self {
            locations: scaled,
            state: values,
            band_names: atm.iter().map(|&b| names[b].clone()).collect(),
        })
    }

    /// Number of reference pixels.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Check if there are no reference pixels.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Number of atmospheric bands.
    pub fn n_bands(&self) -> usize {
        self.band_names.len()
    }

    /// Atmospheric band names.
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// Scaled location of reference pixel `i`.
    pub fn location(&self, i: usize) -> &ScaledCoordinate {
        &self.locations[i]
    }

    /// All scaled locations.
    pub fn locations(&self) -> &[ScaledCoordinate] {
        &self.locations
    }

    /// Atmospheric state of reference pixel `i`.
    pub fn state(&self, i: usize) -> &[f64] {
        let n = self.n_bands();
        &self.state[i * n..(i + 1) * n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envi_raster::{MemoryGrid, RasterShape};

    #[test]
    fn test_atmospheric_bands() {
        let names: Vec<String> = ["RFL_400", "AOT550", "RFL_410", "H2OSTR"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(atmospheric_bands(&names, "RFL_"), vec![1, 3]);
    }

    #[test]
    fn test_load_keeps_atmospheric_bands() {
        // 2x2 reference, 3 state bands, the middle one is reflectance
        let state = MemoryGrid::new(
            RasterShape::new(2, 2, 3),
            (0..12).map(|v| v as f64).collect(),
        )
        .unwrap()
        .with_band_names(vec!["AOT550", "RFL_500", "H2OSTR"])
        .unwrap();
        let locations = MemoryGrid::new(
            RasterShape::new(4, 1, 3),
            (0..12).map(|v| v as f64 * 0.5).collect(),
        )
        .unwrap();

        let grid = ReferenceGrid::load(&state, &locations, "RFL_").unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.band_names(), &["AOT550".to_string(), "H2OSTR".to_string()]);
        assert_eq!(grid.state(0), &[0.0, 2.0]);
        assert_eq!(grid.state(3), &[9.0, 11.0]);
        let loc = grid.location(1);
        assert_eq!((loc.lat, loc.lon), (1.5e6, 2.0e6));
        assert!((loc.elev - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_load_rejects_pixel_count_mismatch() {
        let state = MemoryGrid::new(RasterShape::new(2, 2, 1), vec![0.0; 4]).unwrap();
        let locations = MemoryGrid::new(RasterShape::new(3, 1, 3), vec![0.0; 9]).unwrap();
        assert!(matches!(
            ReferenceGrid::load(&state, &locations, "RFL_").unwrap_err(),
            InterpolationError::InputShape { .. }
        ));
    }

    #[test]
    fn test_load_rejects_all_reflectance() {
        let state = MemoryGrid::new(RasterShape::new(1, 1, 1), vec![0.0])
            .unwrap()
            .with_band_names(vec!["RFL_400"])
            .unwrap();
        let locations = MemoryGrid::new(RasterShape::new(1, 1, 3), vec![0.0; 3]).unwrap();
        assert!(ReferenceGrid::load(&state, &locations, "RFL_").is_err());
    }

    #[test]
    fn test_new_rejects_ragged_state() {
        let err = ReferenceGrid::new(
            &[[0.0; 3], [1.0; 3]],
            vec![vec![1.0, 2.0], vec![1.0]],
            vec!["a".into(), "b".into()],
        )
        .unwrap_err();
        assert!(matches!(err, InterpolationError::InputShape { .. }));
    }
}
