//! Radar compositing and speckle filtering.

use std::time::Instant;

use bekasi_flood_backend::{EvaluationBackend, SceneFilter};
use bekasi_flood_geography_models::TimeWindow;
use bekasi_flood_raster::{Raster, focal};
use bekasi_flood_spatial::{AoiPolygon, Region};

use crate::AnalysisError;

/// Band name of a filtered composite.
pub const FILTERED_BAND: &str = "VVf";

/// Simplified Lee filter over a 3x3 neighbourhood, in natural intensity.
///
/// Each pixel becomes `mean + w * (x - mean)` with
/// `w = var / (var + var / mean²)`. A zero denominator gives `w = 0`, so
/// homogeneous neighbourhoods collapse to their mean.
#[must_use]
pub fn despeckle(natural: &Raster) -> Raster {
    let spec = *natural.spec();
    let (mean, variance) = focal::focal_mean_variance(natural, 1);

    Raster::from_fn(natural.band(), spec, |col, row| {
        let x = natural.get(col, row)?;
        let m = mean.get(col, row)?;
        let var = variance.get(col, row)?;

        let cu = safe_div(var, m * m);
        let w = safe_div(var, var + cu);
        Some(w.mul_add(x - m, m))
    })
}

fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a / b }
}

/// Filters a decibel composite: natural scale, Lee filter, back to decibels.
///
/// The composite is clipped to `aoi` first so the filter never mixes in
/// pixels from outside the study area.
#[must_use]
pub fn filter_composite(composite_db: &Raster, aoi: &dyn Region) -> Raster {
    let natural = composite_db.clip(aoi).db_to_natural();
    despeckle(&natural).natural_to_db().rename(FILTERED_BAND)
}

/// Builds the filtered VV band for a window.
///
/// Selects every scene acquired in `window` that passes `filter`, takes the
/// per-pixel median, despeckles it and returns decibels clipped to `aoi`.
///
/// # Errors
///
/// Returns [`AnalysisError::InsufficientData`] if no scene matches or the
/// matching scenes do not cover the area of interest, and propagates
/// backend and raster errors.
pub async fn filtered_band(
    backend: &dyn EvaluationBackend,
    aoi: &AoiPolygon,
    window: TimeWindow,
    filter: &SceneFilter,
) -> Result<Raster, AnalysisError> {
    let start = Instant::now();
    let scenes = backend.fetch_scenes(window, filter).await?;
    if scenes.is_empty() {
        return Err(AnalysisError::InsufficientData {
            window,
            what: "SAR scenes".to_string(),
        });
    }

    let count = scenes.len();
    let stack: Vec<Raster> = scenes.into_iter().map(|scene| scene.vv_db).collect();
    let composite = Raster::median_composite("VV", &stack)?;
    let filtered = filter_composite(&composite, aoi);

    if filtered.is_empty() {
        return Err(AnalysisError::InsufficientData {
            window,
            what: format!("SAR coverage of {}", aoi.name()),
        });
    }

    log::debug!(
        "Filtered VV for {window}: {count} scene(s), {} pixel(s) in {:.2}s",
        filtered.count_set(),
        start.elapsed().as_secs_f64()
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use bekasi_flood_backend::memory::InMemoryBackend;
    use bekasi_flood_backend::{OrbitPass, SarScene};
    use bekasi_flood_geography_models::AreaOfInterest;
    use bekasi_flood_raster::GridSpec;
    use chrono::NaiveDate;

    use super::*;

    fn spec() -> GridSpec {
        GridSpec::new(107.0, -6.2, 0.001, 5, 5).unwrap()
    }

    fn aoi() -> AoiPolygon {
        AoiPolygon::from_area(&AreaOfInterest::rectangle("test", 107.0, -6.205, 107.005, -6.2))
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scene(acquired: NaiveDate, db: f64) -> SarScene {
        SarScene {
            acquired,
            instrument_mode: "IW".to_string(),
            pixel_spacing_m: 10.0,
            polarisations: vec!["VV".to_string()],
            orbit_pass: OrbitPass::Descending,
            vv_db: Raster::filled("VV", spec(), Some(db)),
        }
    }

    #[test]
    fn homogeneous_areas_are_smoothed_to_their_mean() {
        let natural = Raster::filled("VV", spec(), Some(0.05));
        let filtered = despeckle(&natural);
        assert!(
            filtered
                .values()
                .iter()
                .all(|v| (v.unwrap() - 0.05).abs() < 1e-12)
        );
    }

    #[test]
    fn lee_weight_follows_local_statistics() {
        let natural = Raster::from_fn("VV", spec(), |c, r| {
            Some(if c == 2 && r == 2 { 10.0 } else { 1.0 })
        });
        let filtered = despeckle(&natural);

        // Centre window: mean 2, variance 8, cu = 2, w = 0.8.
        let centre = filtered.get(2, 2).unwrap();
        assert!((centre - 8.4).abs() < 1e-9, "centre was {centre}");
    }

    #[test]
    fn filtered_composite_is_clipped_and_in_decibels() {
        let composite = Raster::filled("VV", spec(), Some(-10.0));
        let half = AoiPolygon::from_area(&AreaOfInterest::rectangle(
            "half", 107.0, -6.205, 107.002, -6.2,
        ))
        .unwrap();
        let filtered = filter_composite(&composite, &half);
        assert_eq!(filtered.band(), FILTERED_BAND);
        assert_eq!(filtered.count_set(), 10);
        assert!((filtered.get(0, 0).unwrap() + 10.0).abs() < 1e-9);
        assert_eq!(filtered.get(4, 0), None);
    }

    #[tokio::test]
    async fn composite_uses_the_median_of_matching_scenes() {
        let backend = InMemoryBackend::new()
            .with_scene(scene(date(2019, 11, 5), -14.0))
            .with_scene(scene(date(2019, 11, 17), -10.0))
            .with_scene(scene(date(2019, 11, 29), -30.0))
            .with_scene(scene(date(2020, 1, 10), 5.0));
        let window = TimeWindow::new(date(2019, 11, 1), date(2019, 12, 31)).unwrap();

        let band = filtered_band(&backend, &aoi(), window, &SceneFilter::default())
            .await
            .unwrap();
        assert!((band.get(2, 2).unwrap() + 14.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_window_is_insufficient_data() {
        let backend = InMemoryBackend::new().with_scene(scene(date(2019, 11, 5), -12.0));
        let window = TimeWindow::new(date(2021, 1, 1), date(2021, 2, 1)).unwrap();

        let err = filtered_band(&backend, &aoi(), window, &SceneFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }
}
