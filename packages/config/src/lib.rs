#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood analysis configuration.
//!
//! Every constant the analysis depends on (study area, subareas, period
//! windows, change thresholds, risk coefficients and the evaluation
//! timeout) lives in a [`FloodConfig`]. The Bekasi configuration is
//! baked into the binary at compile time via [`include_str!`]; an override
//! file with the same layout can be loaded with [`FloodConfig::load`].

use std::path::Path;
use std::time::Duration;

use bekasi_flood_analysis::{ChangeParams, RiskParams};
use bekasi_flood_backend::SceneFilter;
use bekasi_flood_geography_models::{AreaOfInterest, Period, Subarea, TimeWindow};
use serde::{Deserialize, Serialize};

/// The Bekasi configuration embedded at compile time.
const BEKASI_TOML: &str = include_str!("../config/bekasi.toml");

/// Errors that can occur while loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML could not be parsed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML.
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration parsed but is inconsistent.
    #[error("Invalid config: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Observation windows of the three periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindows {
    /// Dry-season baseline, also the reference for change detection.
    pub pre: TimeWindow,
    /// Peak of the event.
    pub during: TimeWindow,
    /// Recovery.
    pub post: TimeWindow,
}

impl PeriodWindows {
    /// Window of `period`.
    #[must_use]
    pub const fn get(&self, period: Period) -> TimeWindow {
        match period {
            Period::Pre => self.pre,
            Period::During => self.during,
            Period::Post => self.post,
        }
    }
}

/// Change-detection constants shared by the during and post runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeSettings {
    /// Change-ratio threshold of the during run.
    pub during_threshold: f64,
    /// Change-ratio threshold of the post run.
    pub post_threshold: f64,
    /// Intensity substituted for unset baseline pixels.
    pub baseline_epsilon: f64,
    /// Seasonality cutoff (months per year) for permanent water.
    pub permanent_water_seasonality: f64,
    /// Slope cutoff in degrees.
    pub max_slope_deg: f64,
    /// Cap of the connected-pixel count.
    pub connectivity_cap: usize,
    /// Minimum connected pixels, exclusive.
    pub min_connected: usize,
}

/// Exposure reporting settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureSettings {
    /// Buffer radius around each subarea point, metres.
    pub buffer_radius_m: f64,
    /// Number of hotspots reported for the during run.
    pub during_top_n: usize,
    /// Number of still-flooded subareas reported for the post run.
    pub post_top_n: usize,
}

/// Complete configuration of a flood analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodConfig {
    /// Upper bound on one period run, seconds.
    pub timeout_secs: u64,
    /// Study area.
    pub area: AreaOfInterest,
    /// Period windows.
    pub windows: PeriodWindows,
    /// Radar acquisition filter.
    pub scene_filter: SceneFilter,
    /// Change detection.
    pub change: ChangeSettings,
    /// Risk score coefficients.
    pub risk: RiskParams,
    /// Exposure reporting.
    pub exposure: ExposureSettings,
    /// Named subareas statistics are reported for.
    pub subareas: Vec<Subarea>,
}

impl FloodConfig {
    /// The embedded Bekasi configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. This is a compile-time
    /// guarantee and should never happen in practice.
    #[must_use]
    pub fn bekasi() -> Self {
        Self::from_toml_str(BEKASI_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded config bekasi.toml: {e}"))
    }

    /// Parses and validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on malformed input and
    /// [`ConfigError::Invalid`] if [`Self::validate`] fails.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if a value has no TOML form.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Checks the configuration for values the analysis cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.area.ring.len() < 3 {
            return Err(invalid(format!(
                "area '{}' ring needs at least 3 vertices, found {}",
                self.area.name,
                self.area.ring.len()
            )));
        }
        if self.subareas.is_empty() {
            return Err(invalid("at least one subarea is required"));
        }
        for period in Period::ALL {
            let window = self.windows.get(period);
            TimeWindow::new(window.start, window.end)
                .map_err(|e| invalid(format!("{period} window: {e}")))?;
        }

        for (name, value) in [
            ("change.during_threshold", self.change.during_threshold),
            ("change.post_threshold", self.change.post_threshold),
            ("change.baseline_epsilon", self.change.baseline_epsilon),
            ("exposure.buffer_radius_m", self.exposure.buffer_radius_m),
            ("risk.population_divisor", self.risk.population_divisor),
            ("risk.occurrence_divisor", self.risk.occurrence_divisor),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }

        let change = &self.change;
        if change.min_connected >= change.connectivity_cap {
            return Err(invalid(format!(
                "change.min_connected ({}) must be below change.connectivity_cap ({})",
                change.min_connected, change.connectivity_cap
            )));
        }
        let slope = change.max_slope_deg;
        if slope.is_nan() || slope <= 0.0 || slope > 90.0 {
            return Err(invalid(format!(
                "change.max_slope_deg must be in (0, 90] degrees, got {slope}"
            )));
        }
        let months = change.permanent_water_seasonality;
        if months.is_nan() || months <= 0.0 || months > 12.0 {
            return Err(invalid(format!(
                "change.permanent_water_seasonality must be in (0, 12] months, got {months}"
            )));
        }

        if self.risk.bounds.medium >= self.risk.bounds.high {
            return Err(invalid(format!(
                "risk.bounds.medium ({}) must be below risk.bounds.high ({})",
                self.risk.bounds.medium, self.risk.bounds.high
            )));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be positive"));
        }
        Ok(())
    }

    /// Window of `period`.
    #[must_use]
    pub const fn window(&self, period: Period) -> TimeWindow {
        self.windows.get(period)
    }

    /// Change-ratio threshold of a change-detection period.
    ///
    /// The pre period does not run change detection and has none.
    #[must_use]
    pub const fn threshold(&self, period: Period) -> Option<f64> {
        match period {
            Period::Pre => None,
            Period::During => Some(self.change.during_threshold),
            Period::Post => Some(self.change.post_threshold),
        }
    }

    /// Change-detection parameters of `period`, `None` for pre.
    #[must_use]
    pub fn change_params(&self, period: Period) -> Option<ChangeParams> {
        self.threshold(period).map(|threshold| ChangeParams {
            threshold,
            baseline_epsilon: self.change.baseline_epsilon,
            permanent_water_seasonality: self.change.permanent_water_seasonality,
            max_slope_deg: self.change.max_slope_deg,
            connectivity_cap: self.change.connectivity_cap,
            min_connected: self.change.min_connected,
        })
    }

    /// Number of ranked subareas reported for `period`.
    ///
    /// The pre period reports every subarea.
    #[must_use]
    pub fn top_n(&self, period: Period) -> usize {
        match period {
            Period::Pre => self.subareas.len(),
            Period::During => self.exposure.during_top_n,
            Period::Post => self.exposure.post_top_n,
        }
    }

    /// Evaluation timeout of one period run.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self::bekasi()
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}
