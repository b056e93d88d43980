//! Atmospheric-state interpolation.
//!
//! A sparse reference grid carries retrieved atmospheric state vectors with
//! their geolocation. Every pixel of a dense target grid gets a state from a
//! local linear regression over its nearest reference pixels, and the result
//! is smoothed with a nodata-aware Gaussian.
//!
//! - **Neighbors**: exact kNN over anisotropically scaled `(lat, lon, elev)`
//!   ([`SpatialIndex`])
//! - **Regression**: per-band unweighted least squares on `[1, lat, lon]`,
//!   cached per segmentation label inside each worker ([`RegressionCache`])
//! - **Execution**: disjoint row ranges on a dedicated thread pool, each
//!   worker writing its rows straight into the output ([`ChunkWorker`],
//!   [`dispatch`])
//! - **Smoothing**: normalized convolution that fills holes without pulling
//!   values towards the nodata sentinel ([`Smoother`])
//!
//! # Architecture
//!
//! ```text
//! reference state + locations ──► ReferenceGrid ──► SpatialIndex
//!                                        │               │
//! target locations (+ labels) ──► partition_rows ──► ChunkWorker × n
//!                                                        │
//!                                         BIL rows ──► output raster
//!                                                        │
//!                                                     Smoother
//! ```
//!
//! # Example
//!
//! ```ignore
//! use atm_interpolation::{atm_interpolation, InterpolationConfig, InterpolationPaths, TracingSink};
//!
//! let paths = InterpolationPaths {
//!     reference_state: "subs_state".into(),
//!     reference_locations: "subs_loc".into(),
//!     input_locations: "loc".into(),
//!     segmentation: Some("lbl".into()),
//!     output: "atm_interp".into(),
//! };
//! let summary = atm_interpolation(&paths, &InterpolationConfig::default(), &TracingSink)?;
//! println!("{:.0} pixels/s", summary.pixels_per_second());
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod regression;
pub mod scheduler;
pub mod smoother;
pub mod types;
pub mod worker;

// Re-export commonly used types at crate root
pub use config::InterpolationConfig;
pub use error::{InterpolationError, Result};
pub use events::{InterpolationEvent, NullSink, ProgressSink, TracingSink};
pub use index::{Neighbors, SearchBuffer, SpatialIndex};
pub use output::{MemoryOutput, RowWriter};
pub use pipeline::{atm_interpolation, interpolate, output_header, InterpolationPaths};
pub use reference::{atmospheric_bands, ReferenceGrid};
pub use regression::{fit_local_model, DegradeReason, LocalFit, RegressionCache, RegressionModel};
pub use scheduler::{dispatch, partition_rows};
pub use smoother::{gaussian_blur, gaussian_kernel, Smoother};
pub use types::{ChunkStats, RowRange, RunSummary, ScaledCoordinate, LOCATION_SCALING};
pub use worker::{ChunkWorker, WorkerInputs};
