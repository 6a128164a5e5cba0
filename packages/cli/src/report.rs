//! Plain-text rendering of period outcomes.

use std::fmt::Write as _;

use bekasi_flood_analysis_models::{Hotspot, RiskAssessment};
use bekasi_flood_geography_models::Period;
use bekasi_flood_pipeline::{FloodReport, PeriodOutcome};

/// Renders an outcome for the terminal.
#[must_use]
pub fn summary(outcome: &PeriodOutcome) -> String {
    match outcome {
        PeriodOutcome::Risk(assessment) => risk_summary(assessment),
        PeriodOutcome::Flood(report) => flood_summary(report),
    }
}

fn risk_summary(assessment: &RiskAssessment) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} risk ({} subareas)",
        Period::Pre.label(),
        assessment.records.len()
    );
    let _ = writeln!(
        out,
        "  High: {}  Medium: {}  Low: {}",
        assessment.high.len(),
        assessment.medium.len(),
        assessment.low.len()
    );
    if !assessment.high_alert().is_empty() {
        let _ = writeln!(out, "  High alert: {}", assessment.high_alert().join(", "));
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {:<16} {:>8} {:<7} {:>9} {:>12} {:>10}",
        "SUBAREA", "SCORE", "LEVEL", "ELEV (m)", "POPULATION", "WATER (%)"
    );
    for record in &assessment.records {
        let _ = writeln!(
            out,
            "  {:<16} {:>8.1} {:<7} {:>9.1} {:>12.0} {:>10.1}",
            record.subarea,
            record.risk_score,
            record.risk_level,
            record.elevation,
            record.population_sum,
            record.water_occurrence_mean
        );
    }
    out
}

fn flood_summary(report: &FloodReport) -> String {
    let period = report.period();
    let provenance = &report.provenance;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}: {:.3} km² flooded ({} pixels, threshold {})",
        period.label(),
        report.exposure.total_area_km2,
        provenance.flooded_pixels,
        provenance.threshold
    );
    let _ = writeln!(
        out,
        "  Baseline {}, event {}",
        provenance.baseline, provenance.event
    );
    let _ = writeln!(
        out,
        "  Affected population: {:.0} ({:.1} per km²)",
        report.exposure.total_population_affected, report.population_density
    );

    if report.hotspots.is_empty() {
        let _ = writeln!(out, "  No areas still flooded");
        return out;
    }

    let heading = if period == Period::Post {
        "Still flooded"
    } else {
        "Hotspots"
    };
    let _ = writeln!(out, "  {heading}:");
    for hotspot in &report.hotspots {
        let _ = writeln!(out, "    {}", hotspot_line(hotspot));
    }
    if let Some(count) = report.high_risk_still_flooded {
        let _ = writeln!(out, "  High-risk areas still flooded: {count}");
    }
    out
}

fn hotspot_line(hotspot: &Hotspot) -> String {
    let risk = hotspot
        .risk_level
        .map_or_else(|| "unscored".to_string(), |level| level.to_string());
    format!(
        "{:<16} {:>6.1}% {:>10.0} people  [{risk}]",
        hotspot.exposure.subarea,
        hotspot.exposure.flood_fraction * 100.0,
        hotspot.exposure.population_exposed
    )
}

#[cfg(test)]
mod tests {
    use bekasi_flood_analysis_models::{
        ExposureRecord, ExposureReport, FloodMaskProvenance, RiskLevel, RiskRecord,
    };
    use bekasi_flood_geography_models::TimeWindow;
    use bekasi_flood_raster::{GridSpec, Raster};
    use chrono::NaiveDate;

    use super::*;

    fn window(m1: u32, d1: u32, m2: u32, d2: u32) -> TimeWindow {
        TimeWindow::new(
            NaiveDate::from_ymd_opt(2020, m1, d1).unwrap(),
            NaiveDate::from_ymd_opt(2020, m2, d2).unwrap(),
        )
        .unwrap()
    }

    fn report(period: Period, hotspots: Vec<Hotspot>) -> FloodReport {
        let spec = GridSpec::new(107.0, -6.2, 0.001, 2, 2).unwrap();
        FloodReport {
            mask: Raster::filled("flood", spec, None),
            provenance: FloodMaskProvenance {
                baseline: window(1, 1, 1, 2),
                event: window(2, 1, 2, 2),
                threshold: 1.35,
                flooded_pixels: 0,
            },
            exposure: ExposureReport::new(period, 0.0, 0.0, vec![]),
            hotspots,
            population_density: 0.0,
            high_risk_still_flooded: (period == Period::Post).then_some(0),
        }
    }

    #[test]
    fn risk_summary_lists_high_alert_areas() {
        let assessment = RiskAssessment::new(vec![RiskRecord {
            subarea: "Bekasi Utara".to_string(),
            elevation: 10.0,
            population_sum: 2000.0,
            water_occurrence_mean: 50.0,
            risk_score: 148.0,
            risk_level: RiskLevel::High,
        }]);
        let text = summary(&PeriodOutcome::Risk(assessment));
        assert!(text.contains("High alert: Bekasi Utara"), "{text}");
        assert!(text.contains("148.0"), "{text}");
    }

    #[test]
    fn empty_post_report_says_nothing_is_still_flooded() {
        let text = summary(&PeriodOutcome::Flood(Box::new(report(Period::Post, vec![]))));
        assert!(text.starts_with("Post-flood"), "{text}");
        assert!(text.contains("No areas still flooded"), "{text}");
    }

    #[test]
    fn hotspots_show_their_risk_level() {
        let hotspots = vec![
            Hotspot {
                exposure: ExposureRecord {
                    subarea: "Rawalumbu".to_string(),
                    flood_fraction: 0.25,
                    population_exposed: 120.0,
                },
                risk_level: Some(RiskLevel::High),
            },
            Hotspot {
                exposure: ExposureRecord {
                    subarea: "Jatiasih".to_string(),
                    flood_fraction: 0.0,
                    population_exposed: 0.0,
                },
                risk_level: None,
            },
        ];
        let text = summary(&PeriodOutcome::Flood(Box::new(report(Period::During, hotspots))));
        assert!(text.contains("Hotspots:"), "{text}");
        assert!(text.contains("25.0%"), "{text}");
        assert!(text.contains("[high]"), "{text}");
        assert!(text.contains("[unscored]"), "{text}");
        assert!(!text.contains("still flooded"), "{text}");
    }
}
