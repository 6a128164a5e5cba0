//! Flood change detection.
//!
//! Open water is a specular reflector, so newly flooded land shows up as a
//! change in backscatter between a dry baseline composite and an event
//! composite. Candidates are found by thresholding the natural-intensity
//! ratio, then narrowed by successive exclusions:
//!
//! 1. pixels that are near-permanent water in the long-term record,
//! 2. pixels on slopes steep enough for layover effects,
//! 3. pixels in connected components too small to be a real flood.

use std::time::Instant;

use bekasi_flood_analysis_models::FloodMaskProvenance;
use bekasi_flood_backend::{EvaluationBackend, ReferenceLayer, SceneFilter};
use bekasi_flood_geography_models::TimeWindow;
use bekasi_flood_raster::{Raster, RasterError, connectivity, focal};
use bekasi_flood_spatial::AoiPolygon;
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, preprocess};

/// Band name of a cleaned flood mask.
pub const FLOOD_BAND: &str = "flood";

/// Tuning constants of one change-detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeParams {
    /// Event/baseline ratio above which a pixel is a flood candidate.
    pub threshold: f64,
    /// Intensity substituted for unset baseline pixels.
    pub baseline_epsilon: f64,
    /// Water seasonality (months per year) from which a pixel counts as
    /// permanent water.
    pub permanent_water_seasonality: f64,
    /// Slope in degrees from which a pixel is excluded.
    pub max_slope_deg: f64,
    /// Largest component size that is counted exactly.
    pub connectivity_cap: usize,
    /// Components must be strictly larger than this to survive.
    pub min_connected: usize,
}

impl ChangeParams {
    /// Initial-detection constants with the given threshold.
    #[must_use]
    pub const fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            baseline_epsilon: 1e-6,
            permanent_water_seasonality: 5.0,
            max_slope_deg: 5.0,
            connectivity_cap: 25,
            min_connected: 8,
        }
    }
}

impl Default for ChangeParams {
    fn default() -> Self {
        Self::with_threshold(1.25)
    }
}

/// A cleaned flood mask and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodMask {
    /// `1.0` on flooded pixels, unset elsewhere.
    pub raster: Raster,
    /// Source windows and threshold.
    pub provenance: FloodMaskProvenance,
}

/// Natural-intensity ratio of two decibel composites.
///
/// Unset baseline pixels are replaced by `epsilon` before dividing; unset
/// event pixels stay unset.
///
/// # Errors
///
/// Returns [`RasterError::GridMismatch`] if the grids differ.
pub fn change_ratio(
    baseline_db: &Raster,
    event_db: &Raster,
    epsilon: f64,
) -> Result<Raster, RasterError> {
    let baseline = baseline_db.db_to_natural().unmask(epsilon);
    let event = event_db.db_to_natural();
    event
        .divide(&baseline)
        .map(|ratio| ratio.rename("change_ratio"))
}

/// Pixels whose change ratio exceeds `threshold`, as a self-masked raster.
#[must_use]
pub fn raw_candidates(ratio: &Raster, threshold: f64) -> Raster {
    ratio.gt(threshold).self_mask().rename("flood_raw")
}

/// Applies the permanent-water, slope and connectivity exclusions.
///
/// # Errors
///
/// Returns [`RasterError::GridMismatch`] if the inputs are on different
/// grids.
pub fn clean(
    candidates: &Raster,
    seasonality: &Raster,
    slope: &Raster,
    params: &ChangeParams,
) -> Result<Raster, RasterError> {
    let permanent_water = seasonality.gte(params.permanent_water_seasonality);
    let without_water = candidates.where_mask(&permanent_water, 0.0)?.self_mask();

    let gentle = slope.lt(params.max_slope_deg);
    let without_slopes = without_water.update_mask(&gentle)?;

    let counts = connectivity::connected_pixel_count(&without_slopes, params.connectivity_cap);
    #[allow(clippy::cast_precision_loss)]
    let large_enough = counts.gt(params.min_connected as f64);
    let cleaned = without_slopes.update_mask(&large_enough)?.rename(FLOOD_BAND);

    log::debug!(
        "flood candidates: {} raw, {} after permanent water, {} after slope, {} after connectivity",
        candidates.count_set(),
        without_water.count_set(),
        without_slopes.count_set(),
        cleaned.count_set()
    );
    Ok(cleaned)
}

/// Runs the full change classification on already filtered composites.
///
/// # Errors
///
/// Returns [`RasterError::GridMismatch`] if the inputs are on different
/// grids.
pub fn classify(
    baseline_db: &Raster,
    event_db: &Raster,
    seasonality: &Raster,
    slope: &Raster,
    params: &ChangeParams,
) -> Result<Raster, RasterError> {
    let ratio = change_ratio(baseline_db, event_db, params.baseline_epsilon)?;
    let candidates = raw_candidates(&ratio, params.threshold);
    clean(&candidates, seasonality, slope, params)
}

/// Detects flooding in `event` relative to `baseline`.
///
/// Fetches both composites and the reference layers concurrently, derives
/// slope from elevation and classifies.
///
/// # Errors
///
/// Returns [`AnalysisError::InsufficientData`] if either window has no
/// usable scenes, and propagates backend and raster errors.
pub async fn detect_flood(
    backend: &dyn EvaluationBackend,
    aoi: &AoiPolygon,
    baseline: TimeWindow,
    event: TimeWindow,
    filter: &SceneFilter,
    params: &ChangeParams,
) -> Result<FloodMask, AnalysisError> {
    let start = Instant::now();
    log::info!(
        "Detecting flood: baseline {baseline}, event {event}, threshold {}",
        params.threshold
    );

    let (baseline_db, event_db, seasonality, elevation) = futures::try_join!(
        preprocess::filtered_band(backend, aoi, baseline, filter),
        preprocess::filtered_band(backend, aoi, event, filter),
        fetch_clipped(backend, aoi, ReferenceLayer::WaterSeasonality),
        fetch_clipped(backend, aoi, ReferenceLayer::Elevation),
    )?;

    let slope = focal::slope_degrees(&elevation);
    let raster = classify(&baseline_db, &event_db, &seasonality, &slope, params)?;
    let flooded_pixels = raster.count_set();

    log::info!(
        "Flood mask: {flooded_pixels} pixel(s) in {:.2}s",
        start.elapsed().as_secs_f64()
    );

    Ok(FloodMask {
        raster,
        provenance: FloodMaskProvenance {
            baseline,
            event,
            threshold: params.threshold,
            flooded_pixels,
        },
    })
}

pub(crate) async fn fetch_clipped(
    backend: &dyn EvaluationBackend,
    aoi: &AoiPolygon,
    layer: ReferenceLayer,
) -> Result<Raster, AnalysisError> {
    Ok(backend.fetch_layer(layer).await?.clip(aoi))
}
