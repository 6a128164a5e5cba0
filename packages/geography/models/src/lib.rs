#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area-of-interest, subarea and time-window types.
//!
//! These are the fixed reference inputs of a flood analysis: the study
//! polygon, the named subarea points that statistics are reported for, and
//! the date ranges that select radar observations. They are loaded once and
//! never mutated.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named reference point inside the area of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subarea {
    /// Display name (e.g. "Bekasi Barat").
    pub name: String,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Latitude in decimal degrees.
    pub lat: f64,
}

impl Subarea {
    /// Creates a subarea from a name and a lon/lat pair.
    #[must_use]
    pub fn new(name: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            name: name.into(),
            lon,
            lat,
        }
    }
}

/// The study region as a single closed ring of `[lon, lat]` vertices.
///
/// The ring does not need to repeat its first vertex; consumers close it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaOfInterest {
    /// Human-readable region name.
    pub name: String,
    /// Exterior ring vertices as `[lon, lat]` pairs.
    pub ring: Vec<[f64; 2]>,
}

impl AreaOfInterest {
    /// Builds an axis-aligned rectangular area from its bounds.
    #[must_use]
    pub fn rectangle(name: impl Into<String>, west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            name: name.into(),
            ring: vec![[west, south], [east, south], [east, north], [west, north]],
        }
    }
}

/// A half-open date range `[start, end)` used to select observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First day included.
    pub start: NaiveDate,
    /// First day excluded.
    pub end: NaiveDate,
}

/// Returned when a window's end does not come after its start.
#[derive(Debug, Clone, Error)]
#[error("time window end {end} is not after start {start}")]
pub struct InvalidWindowError {
    /// Requested start.
    pub start: NaiveDate,
    /// Requested end.
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Creates a window, rejecting empty or inverted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWindowError`] if `end <= start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidWindowError> {
        if end <= start {
            return Err(InvalidWindowError { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whether `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Number of days covered.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The three analysis periods of a flood event.
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
pub enum Period {
    /// Before the event: risk scoring.
    Pre,
    /// During the event: initial flood detection.
    During,
    /// After the event: residual flooding during recovery.
    Post,
}

impl Period {
    /// All periods in chronological order.
    pub const ALL: [Self; 3] = [Self::Pre, Self::During, Self::Post];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pre => "Pre-flood",
            Self::During => "During flood",
            Self::Post => "Post-flood",
        }
    }

    /// Position of the period in [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Pre => 0,
            Self::During => 1,
            Self::Post => 2,
        }
    }

    /// Parses a period name, accepting any letter case.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriodError`] for anything other than `pre`,
    /// `during` or `post`.
    pub fn parse(value: &str) -> Result<Self, InvalidPeriodError> {
        Self::from_str(&value.trim().to_lowercase()).map_err(|_| InvalidPeriodError {
            period: value.to_string(),
        })
    }
}

/// An analysis was requested for a period that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid analysis period '{period}', expected one of: pre, during, post")]
pub struct InvalidPeriodError {
    /// The rejected input.
    pub period: String,
}
