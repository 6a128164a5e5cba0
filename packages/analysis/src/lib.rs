#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood analysis stages.
//!
//! * [`preprocess`] turns the radar scenes of a window into a despeckled
//!   decibel composite.
//! * [`change`] compares a baseline and an event composite and produces a
//!   cleaned [`change::FloodMask`].
//! * [`risk`] scores subareas from elevation, population and historical
//!   surface water.
//! * [`exposure`] measures flooded area and affected population.
//!
//! Every stage has a pure function over rasters and an async wrapper that
//! fetches its inputs from an
//! [`EvaluationBackend`](bekasi_flood_backend::EvaluationBackend).
//!
//! A zonal statistic with no samples is not an error: it resolves to the
//! documented default before any arithmetic is done.

pub mod change;
pub mod exposure;
pub mod preprocess;
pub mod risk;

use bekasi_flood_backend::BackendError;
use bekasi_flood_geography_models::TimeWindow;
use bekasi_flood_raster::RasterError;

pub use change::{ChangeParams, FloodMask};
pub use risk::{RiskLayers, RiskParams};

/// Errors that can occur while running an analysis stage.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// No observations intersect the area of interest and window.
    #[error("Insufficient data: no {what} for {window}")]
    InsufficientData {
        /// Window that was requested.
        window: TimeWindow,
        /// What was missing.
        what: String,
    },

    /// The evaluation backend failed.
    #[error("Evaluation backend error: {0}")]
    Backend(#[from] BackendError),

    /// Rasters could not be combined.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),
}
