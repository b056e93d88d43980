//! Error types for raster access.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing rasters.
#[derive(Error, Debug)]
pub enum RasterError {
    /// File I/O error.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header text could not be parsed.
    #[error("invalid header {path}: {message}")]
    InvalidHeader { path: PathBuf, message: String },

    /// A required header field is missing.
    #[error("header {path} is missing required field '{field}'")]
    MissingField { path: PathBuf, field: String },

    /// Unsupported data type code.
    #[error("unsupported data type code {0}")]
    UnsupportedDataType(u32),

    /// Unsupported interleave scheme.
    #[error("unsupported interleave '{0}'")]
    UnsupportedInterleave(String),

    /// Row, column or band outside the raster bounds.
    #[error("{what} index {index} out of bounds (size {size})")]
    OutOfBounds {
        what: &'static str,
        index: usize,
        size: usize,
    },

    /// Buffer length does not match the requested region.
    #[error("buffer length {actual} does not match expected {expected}")]
    BufferMismatch { expected: usize, actual: usize },

    /// Operation requires a particular interleave.
    #[error("operation requires {expected} interleave, raster is {actual}")]
    InterleaveMismatch {
        expected: &'static str,
        actual: String,
    },
}

impl RasterError {
    /// Create an Io error tagged with the file it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a MissingField error.
    pub fn missing_field(path: impl Into<PathBuf>, field: impl Into<String>) -> Self {
        Self::MissingField {
            path: path.into(),
            field: field.into(),
        }
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(what: &'static str, index: usize, size: usize) -> Self {
        Self::OutOfBounds { what, index, size }
    }
}

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
