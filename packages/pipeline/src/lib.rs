#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood analysis orchestrator.
//!
//! A [`FloodPipeline`] owns the evaluation backend, the configuration and
//! the [`AnalysisState`] of one analysis session. Each period runs
//! independently:
//!
//! * **pre** scores every subarea and publishes a [`RiskAssessment`],
//! * **during** detects flooding against the pre window and publishes the
//!   mask, exposure and the top hotspots,
//! * **post** does the same with the post threshold and keeps only the
//!   subareas that are still flooded.
//!
//! Reruns recompute from the source rasters and replace the previous
//! result. A period's flag only ever goes from `false` to `true`: failures
//! are logged and returned to the caller, and leave any earlier result of
//! the period published.

pub mod outcome;
pub mod progress;
pub mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use bekasi_flood_analysis::{AnalysisError, change, exposure, risk};
use bekasi_flood_analysis_models::RiskAssessment;
use bekasi_flood_backend::EvaluationBackend;
use bekasi_flood_config::{ConfigError, FloodConfig};
use bekasi_flood_geography_models::Period;
use bekasi_flood_spatial::{AoiPolygon, SpatialError};

pub use outcome::{FloodReport, PeriodOutcome};
pub use progress::{NullProgress, ProgressCallback, Stage, null_progress};
pub use state::AnalysisState;

use state::PublishedResults;

/// Errors that can occur while running a period.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The requested period is not one of pre, during or post.
    #[error("Invalid period '{period}', expected one of: pre, during, post")]
    InvalidPeriod {
        /// The rejected input.
        period: String,
    },

    /// An analysis stage failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// The run did not finish within the configured timeout.
    #[error("{period} analysis timed out after {seconds}s")]
    Timeout {
        /// Period that was running.
        period: Period,
        /// Configured timeout.
        seconds: u64,
    },

    /// The during run produced no ranked subareas.
    #[error("No flood hotspot data available for {period}")]
    NoHotspots {
        /// Period that was running.
        period: Period,
    },

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The area of interest could not be built.
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

/// Runs flood analysis periods against one backend and configuration.
pub struct FloodPipeline {
    backend: Arc<dyn EvaluationBackend>,
    config: FloodConfig,
    aoi: AoiPolygon,
    progress: Arc<dyn ProgressCallback>,
    results: Mutex<PublishedResults>,
    next_ticket: AtomicU64,
}

impl FloodPipeline {
    /// Creates a pipeline with no published results.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the configuration does not
    /// validate and [`PipelineError::Spatial`] if its area of interest is
    /// degenerate.
    pub fn new(
        backend: Arc<dyn EvaluationBackend>,
        config: FloodConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let aoi = AoiPolygon::from_area(&config.area)?;
        log::debug!(
            "Flood pipeline for '{}' on backend '{}' with {} subarea(s)",
            aoi.name(),
            backend.name(),
            config.subareas.len()
        );

        Ok(Self {
            backend,
            config,
            aoi,
            progress: null_progress(),
            results: Mutex::new(PublishedResults::default()),
            next_ticket: AtomicU64::new(0),
        })
    }

    /// Reports stage progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Replaces the configured area of interest, e.g. with one drawn by a
    /// user.
    #[must_use]
    pub fn with_area_of_interest(mut self, aoi: AoiPolygon) -> Self {
        log::info!("Using area of interest '{}'", aoi.name());
        self.aoi = aoi;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &FloodConfig {
        &self.config
    }

    /// Which periods have a published result.
    #[must_use]
    pub fn state(&self) -> AnalysisState {
        self.results().state()
    }

    /// The most recent published result of `period`.
    #[must_use]
    pub fn published(&self, period: Period) -> Option<Arc<PeriodOutcome>> {
        self.results().outcome(period)
    }

    /// Runs the period named by `period`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidPeriod`] without contacting the
    /// backend if `period` is not a known period name, otherwise as
    /// [`Self::run`].
    pub async fn run_str(&self, period: &str) -> Result<Arc<PeriodOutcome>, PipelineError> {
        let period = Period::parse(period).map_err(|e| {
            log::error!("{e}");
            PipelineError::InvalidPeriod { period: e.period }
        })?;
        self.run(period).await
    }

    /// Runs one period and publishes its result.
    ///
    /// A failed run publishes nothing; the period keeps its flag and any
    /// earlier result. A run that completes after a newer run of the same
    /// period has published is returned to the caller but not published.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Timeout`] if the run exceeds the configured
    /// timeout, [`PipelineError::NoHotspots`] if the during run ranks no
    /// subareas, and propagates analysis errors.
    pub async fn run(&self, period: Period) -> Result<Arc<PeriodOutcome>, PipelineError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        log::info!("{} analysis started (run #{ticket})", period.label());
        self.progress.started(period, Stage::of(period));

        let result = match tokio::time::timeout(self.config.timeout(), self.compute(period)).await
        {
            Ok(result) => result.map(Arc::new),
            Err(_) => Err(PipelineError::Timeout {
                period,
                seconds: self.config.timeout_secs,
            }),
        };

        match &result {
            Ok(outcome) => {
                let published = self
                    .results()
                    .publish(period, ticket, Arc::clone(outcome));
                if !published {
                    log::info!("{period} run #{ticket} superseded by a newer run, not published");
                }
                let elapsed = start.elapsed();
                self.progress.finished(period, elapsed);
                log::info!(
                    "{} analysis finished in {:.2}s",
                    period.label(),
                    elapsed.as_secs_f64()
                );
            }
            Err(e) => {
                self.progress.failed(period, e);
                log::error!("{} analysis failed: {e}", period.label());
            }
        }
        result
    }

    /// Runs pre, during and post in order.
    ///
    /// A failed period does not stop the later ones; each period's result
    /// is returned alongside it.
    pub async fn run_all(&self) -> Vec<(Period, Result<Arc<PeriodOutcome>, PipelineError>)> {
        let mut outcomes = Vec::with_capacity(Period::ALL.len());
        for period in Period::ALL {
            outcomes.push((period, self.run(period).await));
        }
        outcomes
    }

    async fn compute(&self, period: Period) -> Result<PeriodOutcome, PipelineError> {
        match period {
            Period::Pre => self.assess_risk().await,
            Period::During | Period::Post => self.detect(period).await,
        }
    }

    async fn assess_risk(&self) -> Result<PeriodOutcome, PipelineError> {
        self.progress.stage_started(Period::Pre, Stage::ScoreSubareas);
        let records = risk::score_subareas(
            self.backend.as_ref(),
            &self.aoi,
            &self.config.subareas,
            self.config.exposure.buffer_radius_m,
            &self.config.risk,
        )
        .await?;
        self.progress.stage_finished(Period::Pre, Stage::ScoreSubareas);

        let assessment = RiskAssessment::new(records);
        if !assessment.high_alert().is_empty() {
            log::info!("High alert: {}", assessment.high_alert().join(", "));
        }
        Ok(PeriodOutcome::Risk(assessment))
    }

    async fn detect(&self, period: Period) -> Result<PeriodOutcome, PipelineError> {
        let params =
            self.config
                .change_params(period)
                .ok_or_else(|| PipelineError::InvalidPeriod {
                    period: period.to_string(),
                })?;

        self.progress.stage_started(period, Stage::DetectFlood);
        let mask = change::detect_flood(
            self.backend.as_ref(),
            &self.aoi,
            self.config.window(Period::Pre),
            self.config.window(period),
            &self.config.scene_filter,
            &params,
        )
        .await?;
        self.progress.stage_finished(period, Stage::DetectFlood);

        self.progress.stage_started(period, Stage::AggregateExposure);
        let report = exposure::aggregate_exposure(
            self.backend.as_ref(),
            period,
            &mask,
            &self.aoi,
            &self.config.subareas,
            self.config.exposure.buffer_radius_m,
        )
        .await?;
        self.progress.stage_finished(period, Stage::AggregateExposure);

        self.progress.stage_started(period, Stage::RankHotspots);
        let pre = self.published(Period::Pre);
        let risk = pre.as_deref().and_then(PeriodOutcome::risk);
        if risk.is_none() {
            log::debug!("No pre-flood risk published, {period} hotspots are unannotated");
        }
        let report = FloodReport::new(mask, report, self.config.top_n(period), risk);
        self.progress.stage_finished(period, Stage::RankHotspots);

        if period == Period::During && report.hotspots.is_empty() {
            return Err(PipelineError::NoHotspots { period });
        }
        Ok(PeriodOutcome::Flood(Box::new(report)))
    }

    /// # Panics
    ///
    /// Panics if the results `Mutex` is poisoned.
    fn results(&self) -> MutexGuard<'_, PublishedResults> {
        self.results
            .lock()
            .expect("published results mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use async_trait::async_trait;
    use bekasi_flood_analysis_models::RiskLevel;
    use bekasi_flood_backend::memory::InMemoryBackend;
    use bekasi_flood_backend::{
        BackendError, Evaluation, EvaluationRequest, OrbitPass, ReferenceLayer, SarScene,
    };
    use bekasi_flood_geography_models::Subarea;
    use bekasi_flood_raster::{GridSpec, Raster};
    use chrono::NaiveDate;

    use super::*;

    const BLOCK_START: usize = 5;

    fn spec() -> GridSpec {
        GridSpec::new(106.97, -6.20, 0.001, 40, 40).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Decibel backscatter of `inside` natural intensity in a square block
    /// of `size` pixels, intensity 1.0 elsewhere.
    fn backscatter(size: usize, inside: f64) -> Raster {
        let block = BLOCK_START..BLOCK_START + size;
        Raster::from_fn("VV", spec(), |c, r| {
            let natural = if block.contains(&c) && block.contains(&r) {
                inside
            } else {
                1.0
            };
            Some(10.0 * natural.log10())
        })
    }

    fn scene(acquired: NaiveDate, vv_db: Raster) -> SarScene {
        SarScene {
            acquired,
            instrument_mode: "IW".to_string(),
            pixel_spacing_m: 10.0,
            polarisations: vec!["VV".to_string(), "VH".to_string()],
            orbit_pass: OrbitPass::Ascending,
            vv_db,
        }
    }

    /// Flat, dry terrain with a flood block of `during` pixels per side
    /// during the event and `post` pixels per side in recovery.
    fn backend(during: usize, post: usize) -> InMemoryBackend {
        flooded_backend(during, post, 2.0)
    }

    fn flooded_backend(during: usize, post: usize, intensity: f64) -> InMemoryBackend {
        InMemoryBackend::new()
            .with_scene(scene(date(2019, 11, 20), backscatter(0, 1.0)))
            .with_scene(scene(date(2020, 1, 2), backscatter(during, intensity)))
            .with_scene(scene(date(2020, 2, 25), backscatter(post, intensity)))
            .with_layer(ReferenceLayer::Elevation, Raster::filled("elevation", spec(), Some(10.0)))
            .with_layer(ReferenceLayer::Population, Raster::filled("population", spec(), Some(5.0)))
            .with_layer(
                ReferenceLayer::WaterOccurrence,
                Raster::filled("occurrence", spec(), Some(0.0)),
            )
            .with_layer(
                ReferenceLayer::WaterSeasonality,
                Raster::filled("seasonality", spec(), Some(0.0)),
            )
    }

    fn config() -> FloodConfig {
        let (lon, lat) = spec().pixel_center(BLOCK_START + 3, BLOCK_START + 3);
        let mut config = FloodConfig::bekasi();
        config.subareas = vec![
            Subarea::new("Bekasi Barat", lon, lat),
            Subarea::new("Outside", 107.14, -6.44),
        ];
        config
    }

    fn pipeline(backend: InMemoryBackend) -> (FloodPipeline, Arc<InMemoryBackend>) {
        let backend = Arc::new(backend);
        let pipeline = FloodPipeline::new(backend.clone(), config()).unwrap();
        (pipeline, backend)
    }

    fn flood(outcome: &PeriodOutcome) -> &FloodReport {
        outcome.flood().expect("flood outcome")
    }

    #[tokio::test]
    async fn pre_reruns_are_deterministic_and_keep_the_flag() {
        let (pipeline, _) = pipeline(backend(6, 6));

        let first = pipeline.run(Period::Pre).await.unwrap();
        assert!(pipeline.state().pre);
        let second = pipeline.run(Period::Pre).await.unwrap();
        assert!(pipeline.state().pre);

        let scores = |o: &PeriodOutcome| {
            o.risk()
                .unwrap()
                .records
                .iter()
                .map(|r| (r.subarea.clone(), r.risk_score))
                .collect::<Vec<_>>()
        };
        assert_eq!(scores(&first), scores(&second));
    }

    #[tokio::test]
    async fn pre_groups_subareas_by_level() {
        let (pipeline, _) = pipeline(backend(6, 6));
        let outcome = pipeline.run(Period::Pre).await.unwrap();
        let risk = outcome.risk().unwrap();

        assert_eq!(risk.high_alert(), ["Bekasi Barat".to_string()]);
        assert_eq!(risk.level_of("Outside"), Some(RiskLevel::Medium));
        assert!((risk.records[1].risk_score - 40.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn failing_backend_leaves_the_flag_false() {
        let (pipeline, _) = pipeline(InMemoryBackend::new());

        let err = pipeline.run(Period::Pre).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Analysis(AnalysisError::Backend(BackendError::UnknownLayer { .. }))
        ));
        assert!(!pipeline.state().pre);
        assert!(pipeline.published(Period::Pre).is_none());
    }

    /// Serves from `inner` until `failing` is set.
    struct SwitchableBackend {
        inner: InMemoryBackend,
        failing: AtomicBool,
    }

    #[async_trait]
    impl EvaluationBackend for SwitchableBackend {
        fn name(&self) -> &str {
            "switchable"
        }

        async fn evaluate(
            &self,
            request: &EvaluationRequest,
        ) -> Result<Evaluation, BackendError> {
            if self.failing.load(Ordering::Relaxed) {
                return Err(BackendError::Evaluation {
                    message: "Computation timed out.".to_string(),
                });
            }
            self.inner.evaluate(request).await
        }
    }

    #[tokio::test]
    async fn failed_rerun_keeps_the_published_result() {
        let backend = Arc::new(SwitchableBackend {
            inner: backend(6, 6),
            failing: AtomicBool::new(false),
        });
        let pipeline = FloodPipeline::new(backend.clone(), config()).unwrap();

        let first = pipeline.run(Period::Pre).await.unwrap();
        backend.failing.store(true, Ordering::Relaxed);

        let err = pipeline.run(Period::Pre).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Analysis(AnalysisError::Backend(BackendError::Evaluation { .. }))
        ));
        assert!(pipeline.state().pre);
        let published = pipeline.published(Period::Pre).unwrap();
        assert!(Arc::ptr_eq(&published, &first));
    }

    #[tokio::test]
    async fn missing_scenes_are_insufficient_data() {
        let backend = InMemoryBackend::new()
            .with_layer(ReferenceLayer::Elevation, Raster::filled("elevation", spec(), Some(10.0)))
            .with_layer(
                ReferenceLayer::WaterSeasonality,
                Raster::filled("seasonality", spec(), Some(0.0)),
            );
        let (pipeline, _) = pipeline(backend);

        let err = pipeline.run(Period::During).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Analysis(AnalysisError::InsufficientData { .. })
        ));
        assert!(!pipeline.state().during);
    }

    #[tokio::test]
    async fn invalid_period_runs_no_stage() {
        let (pipeline, backend) = pipeline(backend(6, 6));

        let err = pipeline.run_str("monsoon").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPeriod { ref period } if period == "monsoon"));
        assert_eq!(backend.requests(), 0);
        assert_eq!(pipeline.state(), AnalysisState::default());
    }

    #[tokio::test]
    async fn period_names_are_case_insensitive() {
        let (pipeline, _) = pipeline(backend(6, 6));
        pipeline.run_str("PRE").await.unwrap();
        assert!(pipeline.state().pre);
    }

    #[tokio::test]
    async fn small_flood_blocks_are_removed_by_connectivity() {
        let (pipeline, _) = pipeline(backend(2, 0));
        let outcome = pipeline.run(Period::During).await.unwrap();
        let report = flood(&outcome);

        assert_eq!(report.provenance.flooded_pixels, 0);
        assert_eq!(report.exposure.total_area_km2, 0.0);
        assert_eq!(report.population_density, 0.0);
        assert!(pipeline.state().during);
    }

    #[tokio::test]
    async fn large_flood_blocks_survive_with_their_area() {
        let (pipeline, _) = pipeline(backend(6, 0));
        let outcome = pipeline.run(Period::During).await.unwrap();
        let report = flood(&outcome);

        let spec = spec();
        let expected: f64 = (BLOCK_START..BLOCK_START + 6)
            .map(|row| 6.0 * spec.pixel_area_km2(row))
            .sum();
        assert_eq!(report.provenance.flooded_pixels, 36);
        assert!((report.exposure.total_area_km2 - expected).abs() < 1e-9);
        assert!((report.exposure.total_population_affected - 36.0 * 5.0).abs() < 1e-9);
        assert!((report.provenance.threshold - 1.25).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn despeckling_trims_the_corners_of_a_faint_flood_block() {
        // At 1.3 the Lee filter pulls each block corner to ~1.227, under
        // the 1.25 during threshold; edges stay at ~1.259.
        let (pipeline, _) = pipeline(flooded_backend(6, 6, 1.3));
        let outcome = pipeline.run(Period::During).await.unwrap();
        let report = flood(&outcome);

        let spec = spec();
        let last = BLOCK_START + 5;
        let expected: f64 = (BLOCK_START..=last)
            .map(|row| {
                let pixels = if row == BLOCK_START || row == last { 4.0 } else { 6.0 };
                pixels * spec.pixel_area_km2(row)
            })
            .sum();
        assert_eq!(report.provenance.flooded_pixels, 32);
        assert!((report.exposure.total_area_km2 - expected).abs() < 1e-9);
        assert!((report.exposure.total_population_affected - 32.0 * 5.0).abs() < 1e-9);
        assert_eq!(report.mask.get(BLOCK_START, BLOCK_START), None);
        assert_eq!(report.mask.get(last, last), None);
        assert_eq!(report.mask.get(BLOCK_START + 1, BLOCK_START), Some(1.0));

        // Nothing in the block reaches the 1.35 recovery threshold.
        let post = pipeline.run(Period::Post).await.unwrap();
        assert_eq!(flood(&post).provenance.flooded_pixels, 0);
        assert!(flood(&post).hotspots.is_empty());
    }

    #[tokio::test]
    async fn during_hotspots_carry_the_pre_flood_level() {
        let (pipeline, _) = pipeline(backend(6, 0));

        let unannotated = pipeline.run(Period::During).await.unwrap();
        assert!(flood(&unannotated).hotspots.iter().all(|h| h.risk_level.is_none()));

        pipeline.run(Period::Pre).await.unwrap();
        let outcome = pipeline.run(Period::During).await.unwrap();
        let hotspots = &flood(&outcome).hotspots;

        assert_eq!(hotspots.len(), 2);
        assert_eq!(hotspots[0].exposure.subarea, "Bekasi Barat");
        assert!(hotspots[0].exposure.flood_fraction > 0.0);
        assert_eq!(hotspots[0].risk_level, Some(RiskLevel::High));
        assert_eq!(hotspots[1].exposure.flood_fraction, 0.0);
        assert_eq!(flood(&outcome).high_risk_still_flooded, None);
    }

    #[tokio::test]
    async fn post_keeps_only_subareas_still_flooded() {
        let (pipeline, _) = pipeline(backend(6, 6));
        pipeline.run(Period::Pre).await.unwrap();

        let outcome = pipeline.run(Period::Post).await.unwrap();
        let report = flood(&outcome);
        assert_eq!(report.period(), Period::Post);
        assert!((report.provenance.threshold - 1.35).abs() < f64::EPSILON);
        assert_eq!(report.hotspots.len(), 1);
        assert!(report.hotspots.iter().all(|h| h.exposure.flood_fraction > 0.0));
        assert_eq!(report.high_risk_still_flooded, Some(1));
    }

    #[tokio::test]
    async fn dry_post_period_is_an_empty_success() {
        let (pipeline, _) = pipeline(backend(6, 0));
        let outcome = pipeline.run(Period::Post).await.unwrap();
        let report = flood(&outcome);

        assert!(report.hotspots.is_empty());
        assert_eq!(report.high_risk_still_flooded, Some(0));
        assert!(pipeline.state().post);
    }

    #[tokio::test]
    async fn during_without_ranked_subareas_fails() {
        let backend = Arc::new(backend(6, 0));
        let mut config = config();
        config.exposure.during_top_n = 0;
        let pipeline = FloodPipeline::new(backend, config).unwrap();

        let err = pipeline.run(Period::During).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoHotspots { period: Period::During }));
        assert!(!pipeline.state().during);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backends_time_out() {
        let backend = Arc::new(backend(6, 6).with_latency(Duration::from_secs(30)));
        let mut config = config();
        config.timeout_secs = 5;
        let pipeline = FloodPipeline::new(backend, config).unwrap();

        let err = pipeline.run(Period::Pre).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Timeout {
                period: Period::Pre,
                seconds: 5
            }
        ));
        assert!(!pipeline.state().pre);
    }

    #[tokio::test]
    async fn run_all_reports_every_period() {
        let (pipeline, _) = pipeline(backend(6, 6));
        let outcomes = pipeline.run_all().await;

        let periods: Vec<Period> = outcomes.iter().map(|(p, _)| *p).collect();
        assert_eq!(periods, Period::ALL);
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(
            pipeline.state(),
            AnalysisState {
                pre: true,
                during: true,
                post: true
            }
        );
    }

    #[tokio::test]
    async fn run_all_continues_after_a_failure() {
        // Scenes only: pre cannot score without reference layers, and the
        // flood periods cannot classify without seasonality.
        let backend = InMemoryBackend::new()
            .with_scene(scene(date(2019, 11, 20), backscatter(0, 1.0)))
            .with_scene(scene(date(2020, 1, 2), backscatter(6, 2.0)));
        let (pipeline, backend) = pipeline(backend);

        let outcomes = pipeline.run_all().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|(_, r)| r.is_err()));
        assert!(backend.requests() > 1);
    }

    #[tokio::test]
    async fn demo_scenario_runs_every_period() {
        let scenario = bekasi_flood_backend::memory::Scenario::from_json(include_str!(
            "../../../demos/bekasi_2020.json"
        ))
        .unwrap();
        let backend = Arc::new(scenario.into_backend().unwrap());
        let pipeline = FloodPipeline::new(backend, FloodConfig::bekasi()).unwrap();

        for (period, result) in pipeline.run_all().await {
            assert!(result.is_ok(), "{period}: {:?}", result.err());
        }
        let during = pipeline.published(Period::During).unwrap();
        let report = flood(&during);
        assert!(report.provenance.flooded_pixels > 0);
        assert_eq!(report.hotspots.len(), 3);
        assert!(report.hotspots.iter().all(|h| h.risk_level.is_some()));
    }

    #[tokio::test]
    async fn custom_area_of_interest_limits_the_flood_totals() {
        let spec = spec();
        // Western edge of the grid up to the middle of the flood block.
        let (east, _) = spec.pixel_center(BLOCK_START + 2, 0);
        let b = spec.bounds();
        let aoi = AoiPolygon::from_geojson(
            "west",
            &format!(
                r#"{{"type": "Polygon", "coordinates": [[[{w}, {s}], [{e}, {s}], [{e}, {n}], [{w}, {n}], [{w}, {s}]]]}}"#,
                w = b.west,
                s = b.south,
                e = east + spec.pixel_size_deg / 2.0,
                n = b.north,
            ),
        )
        .unwrap();
        let (pipeline, _) = pipeline(backend(6, 0));
        let pipeline = pipeline.with_area_of_interest(aoi);

        let outcome = pipeline.run(Period::During).await.unwrap();
        let report = flood(&outcome);
        assert_eq!(report.provenance.flooded_pixels, 18);
        assert!((report.exposure.total_population_affected - 18.0 * 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn invalid_configs_are_rejected() {
        let mut config = config();
        config.subareas.clear();
        let err = FloodPipeline::new(Arc::new(backend(6, 6)), config)
            .err()
            .expect("empty subareas should not validate");
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl RecordingProgress {
        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressCallback for RecordingProgress {
        fn started(&self, period: Period, stages: &[Stage]) {
            self.record(format!("{period} started with {} stage(s)", stages.len()));
        }
        fn stage_started(&self, period: Period, stage: Stage) {
            self.record(format!("{period} {stage}"));
        }
        fn stage_finished(&self, period: Period, stage: Stage) {
            self.record(format!("{period} {stage} done"));
        }
        fn finished(&self, period: Period, _elapsed: Duration) {
            self.record(format!("{period} finished"));
        }
        fn failed(&self, period: Period, _error: &PipelineError) {
            self.record(format!("{period} failed"));
        }
    }

    #[tokio::test]
    async fn progress_reports_every_stage_of_the_period() {
        let progress = Arc::new(RecordingProgress::default());
        let (pipeline, _) = pipeline(backend(6, 6));
        let pipeline = pipeline.with_progress(progress.clone());

        pipeline.run(Period::During).await.unwrap();
        assert_eq!(
            progress.events(),
            [
                "during started with 3 stage(s)",
                "during detecting flood",
                "during detecting flood done",
                "during aggregating exposure",
                "during aggregating exposure done",
                "during ranking hotspots",
                "during ranking hotspots done",
                "during finished",
            ]
        );
    }

    #[tokio::test]
    async fn progress_reports_failed_runs() {
        let progress = Arc::new(RecordingProgress::default());
        let (pipeline, _) = pipeline(InMemoryBackend::new());
        let pipeline = pipeline.with_progress(progress.clone());

        pipeline.run(Period::Pre).await.unwrap_err();
        assert_eq!(
            progress.events(),
            [
                "pre started with 1 stage(s)",
                "pre scoring subareas",
                "pre failed",
            ]
        );
    }

    #[tokio::test]
    async fn outcomes_serialize_without_the_mask() {
        let (pipeline, _) = pipeline(backend(6, 0));
        let outcome = pipeline.run(Period::During).await.unwrap();
        let json = serde_json::to_value(outcome.as_ref()).unwrap();

        assert_eq!(json["kind"], "flood");
        assert!(json.get("mask").is_none());
        assert_eq!(json["provenance"]["floodedPixels"], 36);
        assert_eq!(json["exposure"]["period"], "during");
    }
}
