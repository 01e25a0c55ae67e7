//! Server configuration from environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use radar_core::rules::TICK_SECS;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("RADAR_TIME_SCALE must be greater than zero, got {0}")]
    NonPositiveTimeScale(f64),

    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),

    #[error("RADAR_TIME_SCALE {time_scale} gives no usable wall-clock period for the {period}")]
    PeriodOutOfRange { period: &'static str, time_scale: f64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Simulated seconds per wall-clock second
    pub time_scale: f64,
    /// Simulated seconds between conflict scans
    pub conflict_scan_secs: u64,
    pub event_buffer: usize,
    pub weather_max_age_mins: i64,
    pub seed_path: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            conflict_scan_secs: 5,
            event_buffer: 1024,
            weather_max_age_mins: 60,
            seed_path: None,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            time_scale: parse_or(&lookup, "RADAR_TIME_SCALE", defaults.time_scale)?,
            conflict_scan_secs: parse_or(&lookup, "RADAR_CONFLICT_SCAN_SECS", defaults.conflict_scan_secs)?,
            event_buffer: parse_or(&lookup, "RADAR_EVENT_BUFFER", defaults.event_buffer)?,
            weather_max_age_mins: parse_or(
                &lookup,
                "RADAR_WEATHER_MAX_AGE_MINS",
                defaults.weather_max_age_mins,
            )?,
            seed_path: lookup("RADAR_SEED_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            log_json: lookup("RADAR_LOG_JSON")
                .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.log_json),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would give the simulation tick or the conflict
    /// scan a zero or unrepresentable wall-clock period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_scale <= 0.0 || !self.time_scale.is_finite() {
            return Err(ConfigError::NonPositiveTimeScale(self.time_scale));
        }
        if self.conflict_scan_secs == 0 {
            return Err(ConfigError::ZeroPeriod("RADAR_CONFLICT_SCAN_SECS"));
        }

        for (period, secs) in [
            ("simulation tick", TICK_SECS),
            ("conflict scan", self.conflict_scan_secs as f64),
        ] {
            match Duration::try_from_secs_f64(secs / self.time_scale) {
                Ok(wall) if !wall.is_zero() => {}
                _ => {
                    return Err(ConfigError::PeriodOutOfRange {
                        period,
                        time_scale: self.time_scale,
                    })
                }
            }
        }
        Ok(())
    }

    /// Wall-clock period for a span of simulated seconds. Zero when the
    /// result is not representable; [`Config::validate`] rules that out.
    pub fn wall_period(&self, simulated_secs: f64) -> Duration {
        Duration::try_from_secs_f64(simulated_secs / self.time_scale).unwrap_or(Duration::ZERO)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
    }
}
