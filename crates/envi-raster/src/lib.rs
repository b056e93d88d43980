//! Header-described flat binary rasters.
//!
//! A raster is a text header (`.hdr`) describing `lines x samples x bands`,
//! the element type, the byte order and the interleave, plus a flat binary
//! data file. This crate provides:
//!
//! - **Headers**: parse, edit and write ENVI headers ([`EnviHeader`])
//! - **Layout**: byte-offset arithmetic for bil/bip/bsq ([`RasterLayout`])
//! - **Reads**: random-access rows and pixels through [`GridSource`], backed
//!   by a file ([`EnviRaster`]) or by memory ([`MemoryGrid`])
//! - **Writes**: raster allocation ([`create_raster`]) and positional row
//!   writes that need no locking between writers ([`BilChunkWriter`])
//!
//! # Example
//!
//! ```ignore
//! use envi_raster::{EnviRaster, GridSource};
//!
//! let locations = EnviRaster::open("ang20170323t202244_loc")?;
//! let mut row = vec![0.0; locations.shape().row_len()];
//! locations.read_row(0, &mut row)?;
//! ```

pub mod error;
pub mod grid;
pub mod header;
mod io;
pub mod layout;
pub mod reader;
pub mod writer;

pub use error::{RasterError, Result};
pub use grid::{GridSource, MemoryGrid};
pub use header::{header_path, ByteOrder, DataType, EnviHeader, Interleave};
pub use layout::{RasterLayout, RasterShape};
pub use reader::EnviRaster;
pub use writer::{create_raster, BilChunkWriter};
