//! Pre-flood risk scoring of subareas.

use std::time::Instant;

use bekasi_flood_analysis_models::{RiskBounds, RiskLevel, RiskRecord};
use bekasi_flood_backend::{EvaluationBackend, ReferenceLayer};
use bekasi_flood_geography_models::Subarea;
use bekasi_flood_raster::{Raster, Reducer};
use bekasi_flood_spatial::{AoiPolygon, PointBuffer};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;
use crate::change::fetch_clipped;

/// Values used when a buffer yields no samples for a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskDefaults {
    /// Elevation in metres.
    pub elevation: f64,
    /// Population sum.
    pub population: f64,
    /// Water occurrence, percent.
    pub water_occurrence: f64,
}

impl Default for RiskDefaults {
    fn default() -> Self {
        Self {
            elevation: 50.0,
            population: 0.0,
            water_occurrence: 0.0,
        }
    }
}

/// Coefficients of the risk score.
///
/// `score = base - elevation * elevation_weight
///        + population / population_divisor * population_weight
///        + occurrence / occurrence_divisor * occurrence_weight`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Score of a zero-elevation, unpopulated, dry subarea.
    pub base: f64,
    /// Points removed per metre of elevation.
    pub elevation_weight: f64,
    /// Population unit.
    pub population_divisor: f64,
    /// Points per population unit.
    pub population_weight: f64,
    /// Occurrence unit, percent.
    pub occurrence_divisor: f64,
    /// Points per occurrence unit.
    pub occurrence_weight: f64,
    /// Bucket bounds.
    pub bounds: RiskBounds,
    /// Fallbacks for unsampled statistics.
    pub defaults: RiskDefaults,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            base: 100.0,
            elevation_weight: 1.2,
            population_divisor: 1000.0,
            population_weight: 10.0,
            occurrence_divisor: 10.0,
            occurrence_weight: 8.0,
            bounds: RiskBounds::default(),
            defaults: RiskDefaults::default(),
        }
    }
}

impl RiskParams {
    /// Unclamped risk score of fully resolved statistics.
    #[must_use]
    pub fn score(&self, elevation: f64, population: f64, water_occurrence: f64) -> f64 {
        self.base - elevation * self.elevation_weight
            + population / self.population_divisor * self.population_weight
            + water_occurrence / self.occurrence_divisor * self.occurrence_weight
    }

    /// Builds a record from possibly missing statistics.
    ///
    /// Missing values take their defaults before the score is computed.
    #[must_use]
    pub fn record(
        &self,
        subarea: &str,
        elevation: Option<f64>,
        population: Option<f64>,
        water_occurrence: Option<f64>,
    ) -> RiskRecord {
        let elevation = resolve(subarea, "elevation", elevation, self.defaults.elevation);
        let population_sum = resolve(subarea, "population", population, self.defaults.population);
        let water_occurrence_mean = resolve(
            subarea,
            "water occurrence",
            water_occurrence,
            self.defaults.water_occurrence,
        );

        let risk_score = self.score(elevation, population_sum, water_occurrence_mean);
        RiskRecord {
            subarea: subarea.to_string(),
            elevation,
            population_sum,
            water_occurrence_mean,
            risk_score,
            risk_level: RiskLevel::classify(risk_score, self.bounds),
        }
    }
}

fn resolve(subarea: &str, what: &str, value: Option<f64>, default: f64) -> f64 {
    value.unwrap_or_else(|| {
        log::debug!("{subarea}: no {what} samples, using {default}");
        default
    })
}

/// Reference layers sampled by the risk score.
#[derive(Debug, Clone)]
pub struct RiskLayers {
    /// Elevation in metres.
    pub elevation: Raster,
    /// Population count per pixel.
    pub population: Raster,
    /// Long-term water occurrence, percent.
    pub water_occurrence: Raster,
}

/// Scores subareas against already fetched reference layers.
///
/// Statistics are sampled in a buffer of `buffer_radius_m` metres around
/// each subarea point.
#[must_use]
pub fn score_with_layers(
    subareas: &[Subarea],
    layers: &RiskLayers,
    buffer_radius_m: f64,
    params: &RiskParams,
) -> Vec<RiskRecord> {
    subareas
        .iter()
        .map(|subarea| {
            let buffer = PointBuffer::around(subarea, buffer_radius_m);
            params.record(
                &subarea.name,
                layers.elevation.reduce_region(&buffer, Reducer::Mean),
                layers.population.reduce_region(&buffer, Reducer::Sum),
                layers.water_occurrence.reduce_region(&buffer, Reducer::Mean),
            )
        })
        .collect()
}

/// Scores every subarea from the backend's reference layers.
///
/// Records are returned in subarea order.
///
/// # Errors
///
/// Propagates backend errors, e.g. a missing reference layer.
pub async fn score_subareas(
    backend: &dyn EvaluationBackend,
    aoi: &AoiPolygon,
    subareas: &[Subarea],
    buffer_radius_m: f64,
    params: &RiskParams,
) -> Result<Vec<RiskRecord>, AnalysisError> {
    let start = Instant::now();
    let (elevation, population, water_occurrence) = futures::try_join!(
        fetch_clipped(backend, aoi, ReferenceLayer::Elevation),
        fetch_clipped(backend, aoi, ReferenceLayer::Population),
        fetch_clipped(backend, aoi, ReferenceLayer::WaterOccurrence),
    )?;

    let layers = RiskLayers {
        elevation,
        population,
        water_occurrence,
    };
    let records = score_with_layers(subareas, &layers, buffer_radius_m, params);
    log::info!(
        "Scored {} subarea(s) in {:.2}s",
        records.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(records)
}
