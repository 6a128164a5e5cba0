//! Flooded area and affected population.

use std::time::Instant;

use bekasi_flood_analysis_models::{ExposureRecord, ExposureReport};
use bekasi_flood_backend::{EvaluationBackend, ReferenceLayer};
use bekasi_flood_geography_models::{Period, Subarea};
use bekasi_flood_raster::{Raster, RasterError, Reducer};
use bekasi_flood_spatial::{AoiPolygon, PointBuffer, Region};

use crate::AnalysisError;
use crate::change::{FloodMask, fetch_clipped};

/// Aggregates a flood mask against a population raster.
///
/// Totals are summed over `aoi`. Per subarea, the flood fraction is the
/// mean of the mask inside the buffer with unset pixels counted as dry, and
/// the exposed population is the sum of population on flooded pixels. Both
/// default to zero for a buffer without samples.
///
/// # Errors
///
/// Returns [`RasterError::GridMismatch`] if the mask and population grids
/// differ.
pub fn aggregate(
    period: Period,
    mask: &Raster,
    population: &Raster,
    aoi: &dyn Region,
    subareas: &[Subarea],
    buffer_radius_m: f64,
) -> Result<ExposureReport, RasterError> {
    let area = mask.multiply(&Raster::pixel_area_km2(*mask.spec()))?;
    let total_area_km2 = area.clip(aoi).sum();

    let affected = population.multiply(mask)?.rename("affected_population");
    let total_population_affected = affected.clip(aoi).sum();

    let wet_or_dry = mask.unmask(0.0);
    let records = subareas
        .iter()
        .map(|subarea| {
            let buffer = PointBuffer::around(subarea, buffer_radius_m);
            ExposureRecord {
                subarea: subarea.name.clone(),
                flood_fraction: wet_or_dry
                    .reduce_region(&buffer, Reducer::Mean)
                    .unwrap_or(0.0),
                population_exposed: affected
                    .reduce_region(&buffer, Reducer::Sum)
                    .unwrap_or(0.0),
            }
        })
        .collect();

    Ok(ExposureReport::new(
        period,
        total_area_km2,
        total_population_affected,
        records,
    ))
}

/// Fetches the population layer and aggregates exposure for a flood mask.
///
/// # Errors
///
/// Propagates backend and raster errors.
pub async fn aggregate_exposure(
    backend: &dyn EvaluationBackend,
    period: Period,
    mask: &FloodMask,
    aoi: &AoiPolygon,
    subareas: &[Subarea],
    buffer_radius_m: f64,
) -> Result<ExposureReport, AnalysisError> {
    let start = Instant::now();
    let population = fetch_clipped(backend, aoi, ReferenceLayer::Population).await?;
    let report = aggregate(
        period,
        &mask.raster,
        &population,
        aoi,
        subareas,
        buffer_radius_m,
    )?;

    log::info!(
        "{period} exposure: {:.3} km² flooded, {:.0} people affected ({:.2}s)",
        report.total_area_km2,
        report.total_population_affected,
        start.elapsed().as_secs_f64()
    );
    Ok(report)
}
