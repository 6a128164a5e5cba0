//! Radar scenes and the acquisition filter applied when selecting them.

use bekasi_flood_raster::Raster;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Satellite orbit direction at acquisition time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrbitPass {
    /// South-to-north pass.
    Ascending,
    /// North-to-south pass.
    Descending,
}

/// One radar acquisition, already resampled onto the analysis grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SarScene {
    /// Acquisition date.
    pub acquired: NaiveDate,
    /// Instrument mode, e.g. `IW` (interferometric wide swath).
    pub instrument_mode: String,
    /// Ground pixel spacing in metres.
    pub pixel_spacing_m: f64,
    /// Polarisations recorded, e.g. `["VV", "VH"]`.
    pub polarisations: Vec<String>,
    /// Orbit direction.
    pub orbit_pass: OrbitPass,
    /// VV backscatter in decibels.
    pub vv_db: Raster,
}

/// Acquisition parameters a scene must match to enter a composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFilter {
    /// Required instrument mode.
    pub instrument_mode: String,
    /// Required pixel spacing in metres.
    pub pixel_spacing_m: f64,
    /// Polarisation that must be present.
    pub polarisation: String,
    /// Accepted orbit directions.
    pub orbit_passes: Vec<OrbitPass>,
}

impl Default for SceneFilter {
    fn default() -> Self {
        Self {
            instrument_mode: "IW".to_string(),
            pixel_spacing_m: 10.0,
            polarisation: "VV".to_string(),
            orbit_passes: vec![OrbitPass::Ascending, OrbitPass::Descending],
        }
    }
}

impl SceneFilter {
    /// Whether `scene` matches every acquisition parameter.
    #[must_use]
    pub fn accepts(&self, scene: &SarScene) -> bool {
        scene.instrument_mode.eq_ignore_ascii_case(&self.instrument_mode)
            && (scene.pixel_spacing_m - self.pixel_spacing_m).abs() < 1e-6
            && scene
                .polarisations
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&self.polarisation))
            && self.orbit_passes.contains(&scene.orbit_pass)
    }
}
