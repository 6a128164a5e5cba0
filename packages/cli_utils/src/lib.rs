#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal helpers for the `bekasi_flood` binary.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines are printed above the progress bars
//! instead of tearing them. [`IndicatifProgress`] renders the stages of
//! each period run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bekasi_flood_geography_models::Period;
use bekasi_flood_pipeline::{PipelineError, ProgressCallback, Stage};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

pub use indicatif::MultiProgress;

/// Draws one `indicatif` bar per running period, advancing a step per
/// completed stage.
pub struct IndicatifProgress {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<Period, ProgressBar>>,
}

impl IndicatifProgress {
    /// A renderer adding its bars to `multi`.
    #[must_use]
    pub fn new(multi: &MultiProgress) -> Arc<dyn ProgressCallback> {
        let style = ProgressStyle::with_template(
            "{prefix:>22} {bar:24.cyan/dim} {pos}/{len} [{elapsed}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

        Arc::new(Self {
            multi: multi.clone(),
            style,
            bars: Mutex::new(HashMap::new()),
        })
    }

    fn bar(&self, period: Period) -> Option<ProgressBar> {
        self.bars.lock().ok()?.get(&period).cloned()
    }

    fn take(&self, period: Period) -> Option<ProgressBar> {
        self.bars.lock().ok()?.remove(&period)
    }
}

impl ProgressCallback for IndicatifProgress {
    fn started(&self, period: Period, stages: &[Stage]) {
        let bar = self.multi.add(ProgressBar::new(stages.len() as u64));
        bar.set_style(self.style.clone());
        bar.set_prefix(period.label());
        bar.enable_steady_tick(Duration::from_millis(200));

        let previous = self
            .bars
            .lock()
            .ok()
            .and_then(|mut bars| bars.insert(period, bar));
        if let Some(previous) = previous {
            previous.finish_and_clear();
        }
    }

    fn stage_started(&self, period: Period, stage: Stage) {
        if let Some(bar) = self.bar(period) {
            bar.set_message(stage.label());
        }
    }

    fn stage_finished(&self, period: Period, _stage: Stage) {
        if let Some(bar) = self.bar(period) {
            bar.inc(1);
        }
    }

    fn finished(&self, period: Period, elapsed: Duration) {
        if let Some(bar) = self.take(period) {
            bar.finish_with_message(format!("done in {:.1}s", elapsed.as_secs_f64()));
        }
    }

    fn failed(&self, period: Period, error: &PipelineError) {
        if let Some(bar) = self.take(period) {
            bar.abandon_with_message(format!("failed: {error}"));
        }
    }
}

/// Initializes the global logger behind `indicatif-log-bridge`.
///
/// Logs at `info` unless `RUST_LOG` says otherwise. Returns the
/// [`MultiProgress`] every progress bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when called twice, e.g. from tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
