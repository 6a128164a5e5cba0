#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Georeferenced single-band raster grids.
//!
//! A [`Raster`] is an immutable value: every operator borrows its inputs
//! and returns a new raster, so intermediate products can be shared freely
//! between analysis stages. Pixels live in an [`ndarray::Array2`] of
//! `Option<f64>`; `None` marks an unset (masked) pixel, which is distinct
//! from a numeric zero.
//!
//! Operators are grouped by shape of computation:
//!
//! * [`raster`]: pixel-wise algebra, masking and clipping
//! * [`focal`]: neighbourhood statistics and terrain slope
//! * [`connectivity`]: connected-component pixel counts
//! * [`zonal`]: region reductions and temporal compositing

pub mod connectivity;
pub mod focal;
pub mod grid;
pub mod raster;
pub mod zonal;

use thiserror::Error;

pub use grid::GridSpec;
pub use raster::Raster;
pub use zonal::Reducer;

/// Errors that can occur while building or combining rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Grid geometry is unusable.
    #[error("Invalid grid: {message}")]
    InvalidGrid {
        /// Description of what went wrong.
        message: String,
    },

    /// Pixel buffer length does not match the grid.
    #[error("Raster '{band}' has {actual} values but its grid holds {expected}")]
    LengthMismatch {
        /// Band name.
        band: String,
        /// Pixels expected from the grid.
        expected: usize,
        /// Pixels supplied.
        actual: usize,
    },

    /// Two rasters on different grids were combined.
    #[error("Cannot combine '{left}' and '{right}': grids differ")]
    GridMismatch {
        /// Band name of the left operand.
        left: String,
        /// Band name of the right operand.
        right: String,
    },

    /// A composite was requested over zero rasters.
    #[error("Cannot composite an empty raster stack")]
    EmptyStack,
}
