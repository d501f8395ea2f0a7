//! Application settings and validation.
//!
//! Settings load from `VIDHOARD_*` environment variables with sensible
//! defaults, and are validated once at startup. Pure domain types; the CLI
//! is responsible for loading `.env` files before calling
//! [`Settings::from_env`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::backoff::BackoffConfig;
use crate::domain::QualityPreference;

/// Default cron expression for subscription checks (hourly).
pub const DEFAULT_CHECK_CRON: &str = "0 * * * *";

/// Application settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
    /// Root directory for downloaded media.
    pub storage_dir: PathBuf,
    /// Size of the download worker pool.
    pub download_workers: usize,
    /// Size of the discovery worker pool.
    pub discovery_workers: usize,
    /// Quality used when neither video nor subscription specifies one.
    pub default_quality: QualityPreference,
    /// Cron expression for subscriptions created without one.
    pub default_check_cron: String,
    /// Subtitle languages fetched alongside media.
    pub subtitle_languages: Vec<String>,
    /// How many claim attempts a job gets before a transient failure is
    /// terminal.
    pub max_job_attempts: u32,
    /// Minimum interval between persisted progress updates, in milliseconds.
    pub progress_interval_ms: u64,
    /// Idle worker poll interval, in seconds.
    pub worker_poll_secs: u64,
    /// First backoff window once failures pass the threshold, in seconds.
    pub backoff_base_secs: u64,
    /// Upper bound on the backoff window, in seconds.
    pub backoff_max_secs: u64,
    /// Consecutive source failures tolerated before backing off.
    pub backoff_threshold: u32,
    /// Explicit path of the yt-dlp binary; discovered on PATH when unset.
    pub ytdlp_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("vidhoard.db"),
            storage_dir: PathBuf::from("./storage"),
            download_workers: 2,
            discovery_workers: 1,
            default_quality: QualityPreference::P1080,
            default_check_cron: DEFAULT_CHECK_CRON.to_string(),
            subtitle_languages: vec!["en".to_string()],
            max_job_attempts: 3,
            progress_interval_ms: 250,
            worker_poll_secs: 5,
            backoff_base_secs: 30,
            backoff_max_secs: 900,
            backoff_threshold: 3,
            ytdlp_path: None,
        }
    }
}

impl Settings {
    /// Load settings from `VIDHOARD_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env_path("VIDHOARD_DATABASE", defaults.database_path),
            storage_dir: env_path("VIDHOARD_STORAGE", defaults.storage_dir),
            download_workers: env_parse("VIDHOARD_DOWNLOAD_WORKERS", defaults.download_workers),
            discovery_workers: env_parse("VIDHOARD_DISCOVERY_WORKERS", defaults.discovery_workers),
            default_quality: std::env::var("VIDHOARD_QUALITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_quality),
            default_check_cron: std::env::var("VIDHOARD_CHECK_CRON")
                .unwrap_or(defaults.default_check_cron),
            subtitle_languages: std::env::var("VIDHOARD_SUBTITLE_LANGS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.subtitle_languages),
            max_job_attempts: env_parse("VIDHOARD_MAX_ATTEMPTS", defaults.max_job_attempts),
            progress_interval_ms: env_parse(
                "VIDHOARD_PROGRESS_INTERVAL_MS",
                defaults.progress_interval_ms,
            ),
            worker_poll_secs: env_parse("VIDHOARD_WORKER_POLL_SECS", defaults.worker_poll_secs),
            backoff_base_secs: env_parse("VIDHOARD_BACKOFF_BASE_SECS", defaults.backoff_base_secs),
            backoff_max_secs: env_parse("VIDHOARD_BACKOFF_MAX_SECS", defaults.backoff_max_secs),
            backoff_threshold: env_parse("VIDHOARD_BACKOFF_THRESHOLD", defaults.backoff_threshold),
            ytdlp_path: std::env::var("VIDHOARD_YTDLP").ok().map(PathBuf::from),
        }
    }

    /// The backoff configuration these settings describe.
    #[must_use]
    pub const fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            base_delay: Duration::from_secs(self.backoff_base_secs),
            max_delay: Duration::from_secs(self.backoff_max_secs),
            failure_threshold: self.backoff_threshold,
            jitter_ratio: 0.2,
        }
    }

    /// Minimum interval between persisted progress updates.
    #[must_use]
    pub const fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Idle worker poll interval.
    #[must_use]
    pub const fn worker_poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker_poll_secs)
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Settings validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Download worker count must be between 1 and 16, got {0}")]
    InvalidDownloadWorkers(usize),

    #[error("Discovery worker count must be between 1 and 4, got {0}")]
    InvalidDiscoveryWorkers(usize),

    #[error("Storage directory cannot be empty")]
    EmptyStorageDir,

    #[error("Max job attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    #[error("Backoff max ({max}s) must not be below backoff base ({base}s)")]
    InvalidBackoffWindow { base: u64, max: u64 },
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if !(1..=16).contains(&settings.download_workers) {
        return Err(SettingsError::InvalidDownloadWorkers(
            settings.download_workers,
        ));
    }

    if !(1..=4).contains(&settings.discovery_workers) {
        return Err(SettingsError::InvalidDiscoveryWorkers(
            settings.discovery_workers,
        ));
    }

    if settings.storage_dir.as_os_str().is_empty() {
        return Err(SettingsError::EmptyStorageDir);
    }

    if settings.max_job_attempts == 0 {
        return Err(SettingsError::InvalidMaxAttempts(0));
    }

    if settings.backoff_max_secs < settings.backoff_base_secs {
        return Err(SettingsError::InvalidBackoffWindow {
            base: settings.backoff_base_secs,
            max: settings.backoff_max_secs,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }

    #[test]
    fn test_zero_download_workers_rejected() {
        let settings = Settings {
            download_workers: 0,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::InvalidDownloadWorkers(0))
        );
    }

    #[test]
    fn test_backoff_window_ordering_enforced() {
        let settings = Settings {
            backoff_base_secs: 600,
            backoff_max_secs: 60,
            ..Default::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidBackoffWindow { .. })
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let settings = Settings {
            max_job_attempts: 0,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::InvalidMaxAttempts(0))
        );
    }
}
