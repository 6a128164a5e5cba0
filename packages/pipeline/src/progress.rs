//! Stage progress of period runs.
//!
//! A run goes through the fixed [`Stage`]s of its period and reports each
//! one to a [`ProgressCallback`]. The CLI renders them as an `indicatif`
//! bar; library users and tests pass [`NullProgress`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bekasi_flood_geography_models::Period;

use crate::PipelineError;

/// One step of a period run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Sample the reference layers around every subarea and score it.
    ScoreSubareas,
    /// Composite, despeckle and threshold the radar change.
    DetectFlood,
    /// Total the flooded area and population.
    AggregateExposure,
    /// Rank and annotate the hotspots.
    RankHotspots,
}

impl Stage {
    const PRE: &[Self] = &[Self::ScoreSubareas];
    const FLOOD: &[Self] = &[Self::DetectFlood, Self::AggregateExposure, Self::RankHotspots];

    /// The stages a run of `period` goes through, in order.
    #[must_use]
    pub const fn of(period: Period) -> &'static [Self] {
        match period {
            Period::Pre => Self::PRE,
            Period::During | Period::Post => Self::FLOOD,
        }
    }

    /// Short description shown next to a progress bar.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ScoreSubareas => "scoring subareas",
            Self::DetectFlood => "detecting flood",
            Self::AggregateExposure => "aggregating exposure",
            Self::RankHotspots => "ranking hotspots",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives the progress of period runs.
///
/// One callback may observe several runs, including concurrent runs of
/// different periods, so every event names its period.
pub trait ProgressCallback: Send + Sync {
    /// A run of `period` starts and will go through `stages`.
    fn started(&self, period: Period, stages: &[Stage]);

    /// `stage` of the `period` run begins.
    fn stage_started(&self, period: Period, stage: Stage);

    /// `stage` of the `period` run completed.
    fn stage_finished(&self, period: Period, stage: Stage);

    /// The `period` run produced a result after `elapsed`.
    fn finished(&self, period: Period, elapsed: Duration);

    /// The `period` run stopped with `error`.
    fn failed(&self, period: Period, error: &PipelineError);
}

/// Ignores every event.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn started(&self, _period: Period, _stages: &[Stage]) {}
    fn stage_started(&self, _period: Period, _stage: Stage) {}
    fn stage_finished(&self, _period: Period, _stage: Stage) {}
    fn finished(&self, _period: Period, _elapsed: Duration) {}
    fn failed(&self, _period: Period, _error: &PipelineError) {}
}

/// A shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
