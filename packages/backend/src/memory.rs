//! In-memory backend and JSON scenario files.
//!
//! A scenario describes a complete, self-contained analysis input: the grid,
//! every radar scene with its acquisition metadata, and the reference layers.
//! Pixel arrays are row-major with `null` for unset pixels; a bare number
//! fills the whole grid with that value.
//!
//! ```json
//! {
//!   "grid": { "west": 106.88, "north": -6.10, "pixelSizeDeg": 0.01, "width": 27, "height": 35 },
//!   "scenes": [
//!     { "acquired": "2019-11-05", "instrumentMode": "IW", "pixelSpacingM": 10.0,
//!       "polarisations": ["VV", "VH"], "orbitPass": "DESCENDING", "vvDb": -12.0 }
//!   ],
//!   "layers": { "elevation": 15.0, "population": [120.0, null, ...] }
//! }
//! ```

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bekasi_flood_raster::{GridSpec, Raster};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    BackendError, Evaluation, EvaluationBackend, EvaluationRequest, OrbitPass, ReferenceLayer,
    SarScene,
};

/// Serves scenes and reference layers held in memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    scenes: Vec<SarScene>,
    layers: HashMap<ReferenceLayer, Raster>,
    latency: Option<Duration>,
    requests: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scenes: Vec::new(),
            layers: HashMap::new(),
            latency: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Adds a radar scene.
    #[must_use]
    pub fn with_scene(mut self, scene: SarScene) -> Self {
        self.scenes.push(scene);
        self
    }

    /// Sets a reference layer, replacing any previous raster for it.
    #[must_use]
    pub fn with_layer(mut self, layer: ReferenceLayer, raster: Raster) -> Self {
        self.layers.insert(layer, raster);
        self
    }

    /// Delays every response by `latency`, simulating a remote engine.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of requests evaluated so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Reference layers that have not been provided.
    #[must_use]
    pub fn missing_layers(&self) -> Vec<ReferenceLayer> {
        ReferenceLayer::iter()
            .filter(|layer| !self.layers.contains_key(layer))
            .collect()
    }
}

#[async_trait]
impl EvaluationBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, BackendError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match request {
            EvaluationRequest::SarScenes { window, filter } => {
                let scenes: Vec<SarScene> = self
                    .scenes
                    .iter()
                    .filter(|scene| window.contains(scene.acquired) && filter.accepts(scene))
                    .cloned()
                    .collect();
                log::debug!(
                    "memory backend: {} of {} scene(s) match {window}",
                    scenes.len(),
                    self.scenes.len()
                );
                Ok(Evaluation::Scenes(scenes))
            }
            EvaluationRequest::Reference { layer } => self
                .layers
                .get(layer)
                .cloned()
                .map(Evaluation::Raster)
                .ok_or(BackendError::UnknownLayer { layer: *layer }),
        }
    }
}

/// Pixel values of a scenario layer: one constant or a full row-major grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerValues {
    /// Every pixel set to the same value.
    Constant(f64),
    /// One entry per pixel, `null` for unset.
    Pixels(Vec<Option<f64>>),
}

impl LayerValues {
    fn into_raster(self, band: &str, grid: GridSpec) -> Result<Raster, BackendError> {
        match self {
            Self::Constant(value) => Ok(Raster::filled(band, grid, Some(value))),
            Self::Pixels(values) => {
                Raster::new(band, grid, values).map_err(|e| BackendError::Scenario {
                    message: e.to_string(),
                })
            }
        }
    }
}

/// A radar scene as written in a scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioScene {
    /// Acquisition date.
    pub acquired: NaiveDate,
    /// Instrument mode.
    pub instrument_mode: String,
    /// Ground pixel spacing in metres.
    pub pixel_spacing_m: f64,
    /// Polarisations recorded.
    pub polarisations: Vec<String>,
    /// Orbit direction.
    pub orbit_pass: OrbitPass,
    /// VV backscatter in decibels.
    pub vv_db: LayerValues,
}

/// A complete offline analysis input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Grid shared by every raster in the scenario.
    pub grid: GridSpec,
    /// Radar scenes in any order.
    #[serde(default)]
    pub scenes: Vec<ScenarioScene>,
    /// Reference layers keyed by layer name.
    #[serde(default)]
    pub layers: BTreeMap<ReferenceLayer, LayerValues>,
}

impl Scenario {
    /// Parses a scenario from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Json`] if the text is not a valid scenario.
    pub fn from_json(json: &str) -> Result<Self, BackendError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a scenario file.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Io`] if the file cannot be read or
    /// [`BackendError::Json`] if it is not a valid scenario.
    pub async fn load(path: &Path) -> Result<Self, BackendError> {
        let json = tokio::fs::read_to_string(path).await?;
        let scenario = Self::from_json(&json)?;
        log::info!(
            "Loaded scenario {} ({} scene(s), {} layer(s), {}x{} grid)",
            path.display(),
            scenario.scenes.len(),
            scenario.layers.len(),
            scenario.grid.width,
            scenario.grid.height
        );
        Ok(scenario)
    }

    /// Materialises the scenario into a backend.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Scenario`] if the grid is invalid or a pixel
    /// array does not match it.
    pub fn into_backend(self) -> Result<InMemoryBackend, BackendError> {
        let grid = self.grid;
        grid.validate().map_err(|e| BackendError::Scenario {
            message: e.to_string(),
        })?;

        let mut backend = InMemoryBackend::new();
        for scene in self.scenes {
            let vv_db = scene.vv_db.into_raster("VV", grid)?;
            backend = backend.with_scene(SarScene {
                acquired: scene.acquired,
                instrument_mode: scene.instrument_mode,
                pixel_spacing_m: scene.pixel_spacing_m,
                polarisations: scene.polarisations,
                orbit_pass: scene.orbit_pass,
                vv_db,
            });
        }
        for (layer, values) in self.layers {
            let raster = values.into_raster(&layer.to_string(), grid)?;
            backend = backend.with_layer(layer, raster);
        }

        let missing = backend.missing_layers();
        if !missing.is_empty() {
            log::warn!("Scenario has no data for layer(s): {missing:?}");
        }
        Ok(backend)
    }
}
