//! Results published by a period run.

use bekasi_flood_analysis::FloodMask;
use bekasi_flood_analysis_models::{
    ExposureRecord, ExposureReport, FloodMaskProvenance, Hotspot, RiskAssessment, RiskLevel,
};
use bekasi_flood_geography_models::Period;
use bekasi_flood_raster::Raster;
use serde::Serialize;

/// Result of one successful period run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodOutcome {
    /// Pre-flood risk scores.
    Risk(RiskAssessment),
    /// Flood mask and exposure of the during or post period.
    Flood(Box<FloodReport>),
}

impl PeriodOutcome {
    /// The risk assessment, if this is a pre-flood outcome.
    #[must_use]
    pub const fn risk(&self) -> Option<&RiskAssessment> {
        match self {
            Self::Risk(assessment) => Some(assessment),
            Self::Flood(_) => None,
        }
    }

    /// The flood report, if this is a during or post outcome.
    #[must_use]
    pub fn flood(&self) -> Option<&FloodReport> {
        match self {
            Self::Risk(_) => None,
            Self::Flood(report) => Some(report),
        }
    }
}

/// Flood mask, exposure and ranked hotspots of an event period.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodReport {
    /// Cleaned flood mask. Handed to rendering, never serialized.
    #[serde(skip)]
    pub mask: Raster,
    /// Source windows and threshold of the mask.
    pub provenance: FloodMaskProvenance,
    /// Totals and every subarea.
    pub exposure: ExposureReport,
    /// Top subareas by flood fraction with their pre-flood risk level.
    pub hotspots: Vec<Hotspot>,
    /// Affected people per flooded km².
    pub population_density: f64,
    /// Post only: hotspots rated High before the event that are still wet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_risk_still_flooded: Option<usize>,
}

impl FloodReport {
    /// Ranks the exposure and annotates the top `limit` subareas.
    ///
    /// The post period drops subareas that are no longer flooded.
    #[must_use]
    pub fn new(
        mask: FloodMask,
        exposure: ExposureReport,
        limit: usize,
        risk: Option<&RiskAssessment>,
    ) -> Self {
        let recovery = exposure.period == Period::Post;
        let hotspots = annotate(exposure.ranked(recovery, limit), risk);
        let high_risk_still_flooded = recovery.then(|| high_risk_still_flooded(&hotspots));

        Self {
            mask: mask.raster,
            provenance: mask.provenance,
            population_density: exposure.population_density(),
            exposure,
            hotspots,
            high_risk_still_flooded,
        }
    }

    /// Period of the report.
    #[must_use]
    pub const fn period(&self) -> Period {
        self.exposure.period
    }
}

/// Attaches the pre-flood risk level of each subarea, if one is known.
#[must_use]
pub fn annotate(ranked: Vec<ExposureRecord>, risk: Option<&RiskAssessment>) -> Vec<Hotspot> {
    ranked
        .into_iter()
        .map(|exposure| Hotspot {
            risk_level: risk.and_then(|r| r.level_of(&exposure.subarea)),
            exposure,
        })
        .collect()
}

/// Hotspots rated High that still have a positive flood fraction.
#[must_use]
pub fn high_risk_still_flooded(hotspots: &[Hotspot]) -> usize {
    hotspots
        .iter()
        .filter(|h| h.risk_level == Some(RiskLevel::High) && h.exposure.flood_fraction > 0.0)
        .count()
}
