//! Local linear models and their least-squares fit.

use std::fmt;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::reference::ReferenceGrid;
use crate::types::ScaledCoordinate;

/// Coefficients per band: intercept, latitude slope, longitude slope.
pub const N_COEFFICIENTS: usize = 3;

/// Minimum usable neighbors for a determined fit.
const MIN_NEIGHBORS: usize = N_COEFFICIENTS;

/// Per-band linear model `value = c0 + c1 * lat + c2 * lon` in scaled space.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionModel {
    coefficients: Vec<[f64; N_COEFFICIENTS]>,
}

impl RegressionModel {
    /// All-zero model for `n_bands` bands.
    pub fn zeros(n_bands: usize) -> Self {
        Self {
            coefficients: vec![[0.0; N_COEFFICIENTS]; n_bands],
        }
    }

    /// Build a model from explicit coefficient rows.
    pub fn from_rows(coefficients: Vec<[f64; N_COEFFICIENTS]>) -> Self {
        Self { coefficients }
    }

    /// Number of bands.
    pub fn n_bands(&self) -> usize {
        self.coefficients.len()
    }

    /// Coefficient row of one band.
    pub fn row(&self, band: usize) -> &[f64; N_COEFFICIENTS] {
        &self.coefficients[band]
    }

    /// All coefficient rows.
    pub fn rows(&self) -> &[[f64; N_COEFFICIENTS]] {
        &self.coefficients
    }

    /// Evaluate every band at `point`; `out` holds `n_bands` values.
    pub fn evaluate(&self, point: &ScaledCoordinate, out: &mut [f64]) {
        let x = point.predictors();
        for (value, c) in out.iter_mut().zip(&self.coefficients) {
            *value = c[0] * x[0] + c[1] * x[1] + c[2] * x[2];
        }
    }
}

/// Why a band's fit fell back to zero coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradeReason {
    /// Fewer valid neighbors than coefficients.
    TooFewNeighbors,
    /// The normal-equations matrix is singular.
    Singular,
    /// The solution contained NaN or infinity.
    NonFinite,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewNeighbors => write!(f, "too few valid neighbors"),
            Self::Singular => write!(f, "singular normal matrix"),
            Self::NonFinite => write!(f, "non-finite coefficients"),
        }
    }
}

/// A band whose coefficients were zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedBand {
    pub band: usize,
    pub usable_neighbors: usize,
    pub reason: DegradeReason,
}

/// A fitted model plus the bands that degraded along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFit {
    pub model: RegressionModel,
    pub degraded: Vec<DegradedBand>,
}

/// Fit one unweighted least-squares row per band over `neighbors`.
///
/// For each band only neighbors whose value is above `validity_floor` take
/// part; the design matrix is `[1, lat, lon]` of their scaled locations and
/// the row is `(XᵀX)⁻¹ Xᵀy`. A band that cannot be solved gets a zero row.
///
/// Predictors are centered on the usable neighbors before the normal
/// equations are formed and solved by LU with partial pivoting; the
/// intercept is shifted back afterwards, so the row applies to uncentered
/// scaled coordinates.
pub fn fit_local_model(
    reference: &ReferenceGrid,
    neighbors: &[usize],
    validity_floor: f64,
) -> LocalFit {
    let n_bands = reference.n_bands();
    let mut model = RegressionModel::zeros(n_bands);
    let mut degraded = Vec::new();

    for band in 0..n_bands {
        let usable = move || {
            neighbors
                .iter()
                .copied()
                .filter(move |&id| reference.state(id)[band] > validity_floor)
        };

        let mut used = 0usize;
        let (mut lat_sum, mut lon_sum) = (0.0, 0.0);
        for id in usable() {
            let location = reference.location(id);
            lat_sum += location.lat;
            lon_sum += location.lon;
            used += 1;
        }

        let result = if used < MIN_NEIGHBORS {
            Err(DegradeReason::TooFewNeighbors)
        } else {
            let center = (lat_sum / used as f64, lon_sum / used as f64);
            let mut xtx = Matrix3::<f64>::zeros();
            let mut xty = Vector3::<f64>::zeros();
            for id in usable() {
                let location = reference.location(id);
                let x = Vector3::new(1.0, location.lat - center.0, location.lon - center.1);
                xtx += x * x.transpose();
                xty += x * reference.state(id)[band];
            }
            solve_centered(&xtx, &xty, center)
        };

        match result {
            Ok(row) => model.coefficients[band] = row,
            Err(reason) => degraded.push(DegradedBand {
                band,
                usable_neighbors: used,
                reason,
            }),
        }
    }

    LocalFit { model, degraded }
}

fn solve_centered(
    xtx: &Matrix3<f64>,
    xty: &Vector3<f64>,
    center: (f64, f64),
) -> Result<[f64; N_COEFFICIENTS], DegradeReason> {
    let beta = xtx.lu().solve(xty).ok_or(DegradeReason::Singular)?;
    let row = [
        beta[0] - beta[1] * center.0 - beta[2] * center.1,
        beta[1],
        beta[2],
    ];
    if row.iter().all(|c| c.is_finite()) {
        Ok(row)
    } else {
        Err(DegradeReason::NonFinite)
    }
}
