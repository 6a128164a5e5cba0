#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raster evaluation backends.
//!
//! The analysis never reads imagery directly. It asks an
//! [`EvaluationBackend`] for the radar scenes of a time window or for a
//! reference layer (elevation, population, surface-water statistics) and
//! receives materialised [`Raster`] values back. Two implementations ship:
//!
//! * [`memory::InMemoryBackend`] serves rasters held in memory, built in
//!   code or loaded from a JSON [`memory::Scenario`] file.
//! * [`http::HttpBackend`] forwards requests to a remote evaluation engine.

pub mod http;
pub mod memory;
pub mod retry;
pub mod scene;

use async_trait::async_trait;
use bekasi_flood_geography_models::TimeWindow;
use bekasi_flood_raster::Raster;
use serde::{Deserialize, Serialize};

pub use scene::{OrbitPass, SarScene, SceneFilter};

/// Errors that can occur while evaluating a request.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote engine answered with a non-success status.
    #[error("Backend returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The engine accepted the request but could not evaluate it.
    #[error("Evaluation failed: {message}")]
    Evaluation {
        /// Message reported by the engine.
        message: String,
    },

    /// The requested reference layer is not available.
    #[error("Backend has no '{layer}' layer")]
    UnknownLayer {
        /// Layer that was requested.
        layer: ReferenceLayer,
    },

    /// A scenario file is inconsistent.
    #[error("Invalid scenario: {message}")]
    Scenario {
        /// Description of what went wrong.
        message: String,
    },
}

/// Static reference layers sampled by the analysis.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReferenceLayer {
    /// Terrain elevation in metres.
    Elevation,
    /// Population count per pixel.
    Population,
    /// Long-term surface-water occurrence, percent of observations.
    WaterOccurrence,
    /// Months per year with surface water (0-12).
    WaterSeasonality,
}

/// A request understood by every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationRequest {
    /// Radar scenes acquired inside `window` that pass `filter`.
    SarScenes {
        /// Acquisition window.
        window: TimeWindow,
        /// Acquisition-parameter filter.
        filter: SceneFilter,
    },
    /// A static reference layer.
    Reference {
        /// Layer to return.
        layer: ReferenceLayer,
    },
}

/// The result of an [`EvaluationRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Evaluation {
    /// Matching radar scenes, possibly none.
    Scenes(Vec<SarScene>),
    /// A single raster.
    Raster(Raster),
}

impl Evaluation {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Scenes(_) => "scenes",
            Self::Raster(_) => "raster",
        }
    }
}

/// Something that can evaluate raster requests asynchronously.
///
/// Implementations must be `Send + Sync` so a single backend can be shared
/// by concurrent pipeline runs behind an `Arc`.
#[async_trait]
pub trait EvaluationBackend: Send + Sync {
    /// Short identifier used in log output.
    fn name(&self) -> &str;

    /// Evaluates a single request.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the request cannot be evaluated.
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, BackendError>;

    /// Fetches the radar scenes of a window.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if evaluation fails or the backend answers
    /// with something other than a scene list.
    async fn fetch_scenes(
        &self,
        window: TimeWindow,
        filter: &SceneFilter,
    ) -> Result<Vec<SarScene>, BackendError> {
        let request = EvaluationRequest::SarScenes {
            window,
            filter: filter.clone(),
        };
        match self.evaluate(&request).await? {
            Evaluation::Scenes(scenes) => Ok(scenes),
            other => Err(unexpected("scenes", &other)),
        }
    }

    /// Fetches a reference layer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if evaluation fails or the backend answers
    /// with something other than a raster.
    async fn fetch_layer(&self, layer: ReferenceLayer) -> Result<Raster, BackendError> {
        match self.evaluate(&EvaluationRequest::Reference { layer }).await? {
            Evaluation::Raster(raster) => Ok(raster),
            other => Err(unexpected("raster", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &Evaluation) -> BackendError {
    BackendError::Evaluation {
        message: format!("expected {expected}, backend returned {}", got.kind()),
    }
}
