//! Error types for atmospheric interpolation.

use envi_raster::RasterError;
use thiserror::Error;

use crate::types::RowRange;

/// Errors that can abort an interpolation run.
///
/// Numerical trouble inside a single regression fit is not an error: the
/// affected band degrades to zero coefficients and is reported through the
/// progress sink instead.
#[derive(Error, Debug)]
pub enum InterpolationError {
    /// Reading or writing a raster failed.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Input rasters disagree on their dimensions.
    #[error("input shape mismatch in {raster}: {message}")]
    InputShape { raster: String, message: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    /// An output row was written more than once.
    #[error("output row {row} written twice")]
    RowWrittenTwice { row: usize },

    /// A chunk worker failed; the output raster is incomplete.
    #[error("worker for rows {range} failed: {message}")]
    WorkerFailed { range: RowRange, message: String },
}

impl InterpolationError {
    /// Create an InputShape error.
    pub fn input_shape(raster: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputShape {
            raster: raster.into(),
            message: message.into(),
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a WorkerFailed error.
    pub fn worker_failed(range: RowRange, message: impl Into<String>) -> Self {
        Self::WorkerFailed {
            range,
            message: message.into(),
        }
    }
}

/// Result type for interpolation operations.
pub type Result<T> = std::result::Result<T, InterpolationError>;
