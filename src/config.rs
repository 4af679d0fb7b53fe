//! Runtime configuration.
//!
//! Defaults come from [`crate::constants`]; individual values can be
//! overridden from the command line or `TESSEL_*` environment variables.
//! There is no configuration file: the layout is fixed master–stack and
//! everything tunable fits in a handful of knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Gap between windows and screen edges, in points.
    pub gap: f64,
    /// Whether frame changes animate or jump.
    pub animations_enabled: bool,
    /// Animation duration in milliseconds.
    pub animation_duration_ms: u64,
    /// Interval between periodic discovery scans, in milliseconds.
    pub scan_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gap: constants::GAP,
            animations_enabled: true,
            animation_duration_ms: constants::ANIMATION_DURATION.as_millis() as u64,
            scan_interval_ms: constants::DISCOVERY_PERIOD.as_millis() as u64,
        }
    }
}

impl Config {
    /// Builds a configuration from defaults plus environment overrides.
    ///
    /// Recognized variables: `TESSEL_GAP`, `TESSEL_ANIMATIONS`,
    /// `TESSEL_ANIMATION_MS`, `TESSEL_SCAN_MS`. Unparseable values are
    /// logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(gap) = parse_env("TESSEL_GAP") {
            config.gap = gap;
        }
        if let Some(enabled) = parse_env::<bool>("TESSEL_ANIMATIONS") {
            config.animations_enabled = enabled;
        }
        if let Some(ms) = parse_env("TESSEL_ANIMATION_MS") {
            config.animation_duration_ms = ms;
        }
        if let Some(ms) = parse_env("TESSEL_SCAN_MS") {
            config.scan_interval_ms = ms;
        }

        config
    }

    /// Animation duration as a [`Duration`], clamped to the supported range.
    #[must_use]
    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms.clamp(50, 1000))
    }

    /// Discovery scan interval as a [`Duration`].
    #[must_use]
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = Config::default();
        assert!((config.gap - constants::GAP).abs() < f64::EPSILON);
        assert_eq!(config.animation_duration_ms, 180);
        assert_eq!(config.scan_interval_ms, 1500);
        assert!(config.animations_enabled);
    }

    #[test]
    fn test_animation_duration_clamped() {
        let mut config = Config::default();
        config.animation_duration_ms = 5;
        assert_eq!(config.animation_duration(), Duration::from_millis(50));

        config.animation_duration_ms = 30_000;
        assert_eq!(config.animation_duration(), Duration::from_millis(1000));
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"gap": 8.0}"#).unwrap();
        assert!((config.gap - 8.0).abs() < f64::EPSILON);
        assert_eq!(config.scan_interval_ms, 1500);
    }
}
