//! Archiver Configuration Settings
//!
//! Configuration types for the archiver, loaded from environment variables.
//! Configuration-load failures are the only fatal errors in the process.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::infrastructure::bybit::ReconnectConfig;
use crate::infrastructure::flush::FlushSchedule;

/// Default storage quota: 15 GiB, matching a small dedicated data volume.
const DEFAULT_QUOTA_BYTES: u64 = 15 * 1024 * 1024 * 1024;

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Application-level heartbeat ping interval.
    pub ping_interval: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            reconnect_delay_initial: Duration::from_secs(5),
            reconnect_delay_max: Duration::from_secs(60),
            reconnect_delay_multiplier: 2.0,
        }
    }
}

impl WebSocketSettings {
    /// Derive the reconnect policy configuration.
    #[must_use]
    pub const fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: self.reconnect_delay_initial,
            max_delay: self.reconnect_delay_max,
            multiplier: self.reconnect_delay_multiplier,
            jitter_factor: 0.1,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Root directory for output files.
    pub root: PathBuf,
    /// Retention ceiling in bytes.
    pub quota_bytes: u64,
}

/// Complete archiver configuration.
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    /// Feed endpoint URL.
    pub feed_url: String,
    /// Path to the instruments JSON file.
    pub instruments_file: PathBuf,
    /// Storage root and quota.
    pub storage: StorageSettings,
    /// Daily flush time and timezone.
    pub flush: FlushSchedule,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
}

impl ArchiverConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let feed_url = require_env("ARCHIVER_FEED_URL")?;
        let instruments_file = PathBuf::from(require_env("ARCHIVER_INSTRUMENTS_FILE")?);
        let storage_root = PathBuf::from(require_env("ARCHIVER_STORAGE_ROOT")?);

        let timezone_raw =
            std::env::var("ARCHIVER_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let timezone: Tz = timezone_raw
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(timezone_raw))?;

        let flush_time_raw =
            std::env::var("ARCHIVER_FLUSH_TIME").unwrap_or_else(|_| "00:00".to_string());
        let flush_time = NaiveTime::parse_from_str(&flush_time_raw, "%H:%M")
            .map_err(|_| ConfigError::InvalidFlushTime(flush_time_raw))?;

        let quota_bytes = parse_env_u64("ARCHIVER_STORAGE_QUOTA_BYTES", DEFAULT_QUOTA_BYTES);

        let defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            ping_interval: parse_env_duration_secs(
                "ARCHIVER_PING_INTERVAL_SECS",
                defaults.ping_interval,
            ),
            reconnect_delay_initial: parse_env_duration_secs(
                "ARCHIVER_RECONNECT_DELAY_INITIAL_SECS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "ARCHIVER_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "ARCHIVER_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
        };

        Ok(Self {
            feed_url,
            instruments_file,
            storage: StorageSettings {
                root: storage_root,
                quota_bytes,
            },
            flush: FlushSchedule::new(flush_time, timezone),
            websocket,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),

    /// Flush time is not valid `HH:MM`.
    #[error("invalid ARCHIVER_FLUSH_TIME (expected HH:MM): {0:?}")]
    InvalidFlushTime(String),

    /// Timezone is not a valid IANA name.
    #[error("invalid ARCHIVER_TIMEZONE (expected IANA name): {0:?}")]
    InvalidTimezone(String),
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_settings_defaults() {
        let settings = WebSocketSettings::default();
        assert_eq!(settings.ping_interval, Duration::from_secs(20));
        assert_eq!(settings.reconnect_delay_initial, Duration::from_secs(5));
        assert_eq!(settings.reconnect_delay_max, Duration::from_secs(60));
        assert!((settings.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reconnect_config_carries_settings() {
        let settings = WebSocketSettings::default();
        let config = settings.reconnect_config();
        assert_eq!(config.initial_delay, settings.reconnect_delay_initial);
        assert_eq!(config.max_delay, settings.reconnect_delay_max);
        assert!((config.jitter_factor - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn default_quota_is_fifteen_gib() {
        assert_eq!(DEFAULT_QUOTA_BYTES, 16_106_127_360);
    }
}
