#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Records produced by the flood analysis.
//!
//! Pre-flood runs yield a [`RiskAssessment`]; during- and post-flood runs
//! yield an [`ExposureReport`]. All records are plain values: a later run
//! replaces them wholesale.

use std::cmp::Ordering;

use bekasi_flood_geography_models::{Period, TimeWindow};
use serde::{Deserialize, Serialize};

/// Flood-risk bucket of a subarea.
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
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    /// Score below the medium bound.
    Low,
    /// Score at or above the medium bound and below the high bound.
    Medium,
    /// Score at or above the high bound.
    High,
}

/// Lower bounds of the medium and high buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBounds {
    /// Smallest score classified as medium.
    pub medium: f64,
    /// Smallest score classified as high.
    pub high: f64,
}

impl Default for RiskBounds {
    fn default() -> Self {
        Self {
            medium: 30.0,
            high: 70.0,
        }
    }
}

impl RiskLevel {
    /// Buckets a score. Each bucket includes its lower bound.
    #[must_use]
    pub fn classify(score: f64, bounds: RiskBounds) -> Self {
        if score >= bounds.high {
            Self::High
        } else if score >= bounds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Pre-flood risk statistics of one subarea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRecord {
    /// Subarea name.
    pub subarea: String,
    /// Mean elevation in metres (defaulted when unsampled).
    pub elevation: f64,
    /// Total population in the sampling buffer.
    pub population_sum: f64,
    /// Mean long-term water occurrence, percent.
    pub water_occurrence_mean: f64,
    /// Unclamped risk score.
    pub risk_score: f64,
    /// Bucket of `risk_score`.
    pub risk_level: RiskLevel,
}

/// The scored subareas of a pre-flood run, grouped by level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// All records, highest score first.
    pub records: Vec<RiskRecord>,
    /// Names of low-risk subareas.
    pub low: Vec<String>,
    /// Names of medium-risk subareas.
    pub medium: Vec<String>,
    /// Names of high-risk subareas.
    pub high: Vec<String>,
}

impl RiskAssessment {
    /// Sorts the records by descending score and groups them by level.
    #[must_use]
    pub fn new(mut records: Vec<RiskRecord>) -> Self {
        records.sort_by(|a, b| descending(a.risk_score, b.risk_score));

        let names = |level: RiskLevel| {
            records
                .iter()
                .filter(|r| r.risk_level == level)
                .map(|r| r.subarea.clone())
                .collect::<Vec<_>>()
        };
        let low = names(RiskLevel::Low);
        let medium = names(RiskLevel::Medium);
        let high = names(RiskLevel::High);

        Self {
            records,
            low,
            medium,
            high,
        }
    }

    /// Subareas that need a high alert.
    #[must_use]
    pub fn high_alert(&self) -> &[String] {
        &self.high
    }

    /// Records of one level, highest score first.
    pub fn by_level(&self, level: RiskLevel) -> impl Iterator<Item = &RiskRecord> {
        self.records.iter().filter(move |r| r.risk_level == level)
    }

    /// Level of a subarea, if it was scored.
    #[must_use]
    pub fn level_of(&self, subarea: &str) -> Option<RiskLevel> {
        self.records
            .iter()
            .find(|r| r.subarea == subarea)
            .map(|r| r.risk_level)
    }
}

/// Flood exposure of one subarea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureRecord {
    /// Subarea name.
    pub subarea: String,
    /// Share of the sampling buffer that is flooded, in `[0, 1]`.
    pub flood_fraction: f64,
    /// Population living on flooded pixels inside the buffer.
    pub population_exposed: f64,
}

/// Area-wide and per-subarea exposure for one event period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureReport {
    /// Period the report describes.
    pub period: Period,
    /// Flooded area inside the area of interest, km².
    pub total_area_km2: f64,
    /// Population on flooded pixels inside the area of interest.
    pub total_population_affected: f64,
    /// Every subarea, highest flood fraction first.
    pub subareas: Vec<ExposureRecord>,
}

impl ExposureReport {
    /// Builds a report, sorting the subareas by descending flood fraction.
    #[must_use]
    pub fn new(
        period: Period,
        total_area_km2: f64,
        total_population_affected: f64,
        mut subareas: Vec<ExposureRecord>,
    ) -> Self {
        subareas.sort_by(|a, b| descending(a.flood_fraction, b.flood_fraction));
        Self {
            period,
            total_area_km2,
            total_population_affected,
            subareas,
        }
    }

    /// Affected people per flooded km², zero when nothing is flooded.
    #[must_use]
    pub fn population_density(&self) -> f64 {
        if self.total_area_km2 > 0.0 {
            self.total_population_affected / self.total_area_km2
        } else {
            0.0
        }
    }

    /// The top `limit` subareas, optionally without unflooded ones.
    #[must_use]
    pub fn ranked(&self, drop_unflooded: bool, limit: usize) -> Vec<ExposureRecord> {
        self.subareas
            .iter()
            .filter(|r| !drop_unflooded || r.flood_fraction > 0.0)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// A ranked exposure record annotated with the subarea's pre-flood risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    /// Exposure statistics.
    #[serde(flatten)]
    pub exposure: ExposureRecord,
    /// Level from the latest pre-flood run, if any.
    pub risk_level: Option<RiskLevel>,
}

/// Where a flood mask came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodMaskProvenance {
    /// Baseline (dry) window.
    pub baseline: TimeWindow,
    /// Event window.
    pub event: TimeWindow,
    /// Change-ratio threshold.
    pub threshold: f64,
    /// Pixels flagged as flooded after cleaning.
    pub flooded_pixels: usize,
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
