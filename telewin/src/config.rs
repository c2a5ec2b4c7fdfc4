//! Window configuration for the telewin engine.
//!
//! A [`WindowConfig`] fixes the retention span, the tick period, and the static
//! description of every series known up front. It is consumed once, when the
//! [`Registry`](crate::registry::Registry) is built; a config that fails
//! [`WindowConfig::validate`] never produces a running engine.
//!
//! # Example
//!
//! ```rust
//! use telewin::config::{SeriesConfig, WindowConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config: WindowConfig = serde_json::from_str(r#"{
//!     "retention_span": 600,
//!     "series": [
//!         { "name": "batt.voltage", "axis": "volts", "color": "orange" },
//!         { "name": "grid.power", "axis": "watts", "title": "Grid" }
//!     ]
//! }"#)?;
//! config.validate()?;
//! assert_eq!(config.tick_period_ms, 1000);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::series::Tick;

/// Number of ticks kept when no retention span is configured.
pub const DEFAULT_RETENTION_SPAN: Tick = 1000;

/// Largest accepted retention span (about 194 days at one tick per second).
pub const MAX_RETENTION_SPAN: Tick = 1 << 24;

/// Tick period in milliseconds when none is configured.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 1000;

/// Top-level configuration for a telemetry window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// How many ticks of history each series keeps.
    ///
    /// At tick `t` every series is trimmed to samples with `x >= t - retention_span`.
    #[serde(default = "default_retention_span")]
    pub retention_span: Tick,

    /// Period of the tick driver in milliseconds.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Series registered when the registry is built.
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

/// Static description of one series.
///
/// Only `name` and `axis` mean anything to the engine; `title` and `color` are
/// passed through untouched to the rendering side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Unique series name.
    pub name: String,

    /// Axis the series is plotted against. Series sharing an axis share extrema.
    #[serde(default)]
    pub axis: String,

    /// Optional grouping label (e.g. a device or a panel).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Display title; the name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_retention_span() -> Tick {
    DEFAULT_RETENTION_SPAN
}

fn default_tick_period_ms() -> u64 {
    DEFAULT_TICK_PERIOD_MS
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            retention_span: DEFAULT_RETENTION_SPAN,
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            series: Vec::new(),
        }
    }
}

impl WindowConfig {
    /// Creates a configuration with the given span and period and no series.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if the span or period is invalid.
    pub fn new(retention_span: Tick, tick_period: Duration) -> Result<Self> {
        let tick_period_ms = u64::try_from(tick_period.as_millis()).map_err(|_| {
            ConfigError::InvalidConfiguration {
                reason: format!("tick period {tick_period:?} is too large"),
            }
        })?;
        let config = Self {
            retention_span,
            tick_period_ms,
            series: Vec::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Adds a series description, builder style.
    #[must_use]
    pub fn with_series(mut self, series: SeriesConfig) -> Self {
        self.series.push(series);
        self
    }

    /// Reads and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if the file cannot
    /// be loaded, and [`ConfigError::InvalidConfiguration`] if it fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the tick period as a [`Duration`].
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if:
    /// - `retention_span` is zero, negative, or above [`MAX_RETENTION_SPAN`]
    /// - `tick_period_ms` is zero
    /// - a series name is empty or appears twice
    pub fn validate(&self) -> Result<()> {
        if self.retention_span <= 0 {
            return Err(invalid(format!(
                "retention span must be positive, got {}",
                self.retention_span
            )));
        }
        if self.retention_span > MAX_RETENTION_SPAN {
            return Err(invalid(format!(
                "retention span {} exceeds the maximum of {MAX_RETENTION_SPAN}",
                self.retention_span
            )));
        }
        if self.tick_period_ms == 0 {
            return Err(invalid("tick period must be non-zero".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.series.len());
        for series in &self.series {
            if series.name.is_empty() {
                return Err(invalid("series name cannot be empty".to_string()));
            }
            if !seen.insert(series.name.as_str()) {
                return Err(invalid(format!("series '{}' is configured twice", series.name)));
            }
        }
        Ok(())
    }
}

fn invalid(reason: String) -> crate::error::TelewinError {
    ConfigError::InvalidConfiguration { reason }.into()
}

impl SeriesConfig {
    /// Creates a series description with a name and axis and no cosmetics.
    pub fn new(name: impl Into<String>, axis: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            axis: axis.into(),
            group: None,
            title: None,
            color: None,
        }
    }

    /// Sets the grouping label.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the display title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the display color.
    #[must_use]
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Returns the display title, falling back to the series name.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}
