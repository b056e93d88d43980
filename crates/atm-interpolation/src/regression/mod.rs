//! Local regression models and their per-worker cache.

mod cache;
mod model;

pub use cache::RegressionCache;
pub use model::{
    fit_local_model, DegradeReason, DegradedBand, LocalFit, RegressionModel, N_COEFFICIENTS,
};
