//! Client configuration
//!
//! Loaded from `~/.vprompt/config.json`. Every field has a serde default so a
//! partial file only overrides what it names; a missing or unreadable file
//! yields [`AppConfig::default`]. `VPROMPT_BASE_URL` overrides the base URL.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::jobs::JobKind;

const CONFIG_FILENAME: &str = "config.json";
const BASE_URL_ENV: &str = "VPROMPT_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which status endpoint the polling loop queries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEndpoint {
    /// `GET /generation_status/{id}`
    #[default]
    Generation,
    /// `GET /job_status/{id}`, kept for older backends
    #[deprecated(note = "use StatusEndpoint::Generation; /job_status is a legacy alias")]
    Legacy,
}

impl StatusEndpoint {
    pub fn path(&self, job_id: &str) -> String {
        #[allow(deprecated)]
        match self {
            StatusEndpoint::Generation => format!("/generation_status/{job_id}"),
            StatusEndpoint::Legacy => format!("/job_status/{job_id}"),
        }
    }
}

/// Timing of one job kind's polling and result retrieval
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Retries after the first result fetch
    #[serde(default = "default_max_result_retries")]
    pub max_result_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Progress stays visible at least this long before the result is fetched
    #[serde(default = "default_min_display_ms")]
    pub min_display_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_result_retries() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_min_display_ms() -> u64 {
    2000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_result_retries: default_max_result_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            min_display_ms: default_min_display_ms(),
        }
    }
}

impl PollingConfig {
    pub fn voice_defaults() -> Self {
        Self {
            poll_interval_ms: 1000,
            min_display_ms: 0,
            ..Self::default()
        }
    }

    /// Voice timing from the file: named fields win, the rest stay voice defaults
    fn deserialize_voice<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PollingOverrides::deserialize(deserializer).map(|o| o.apply(Self::voice_defaults()))
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn min_display_time(&self) -> Duration {
        Duration::from_millis(self.min_display_ms)
    }
}

#[derive(Deserialize)]
struct PollingOverrides {
    poll_interval_ms: Option<u64>,
    max_result_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    min_display_ms: Option<u64>,
}

impl PollingOverrides {
    fn apply(self, base: PollingConfig) -> PollingConfig {
        PollingConfig {
            poll_interval_ms: self.poll_interval_ms.unwrap_or(base.poll_interval_ms),
            max_result_retries: self.max_result_retries.unwrap_or(base.max_result_retries),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(base.retry_delay_ms),
            min_display_ms: self.min_display_ms.unwrap_or(base.min_display_ms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub status_endpoint: StatusEndpoint,
    #[serde(default)]
    pub image: PollingConfig,
    #[serde(
        default = "PollingConfig::voice_defaults",
        deserialize_with = "PollingConfig::deserialize_voice"
    )]
    pub voice: PollingConfig,
    /// Lifetime of a toast notification
    #[serde(default = "default_toast_secs")]
    pub toast_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_toast_secs() -> u64 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            status_endpoint: StatusEndpoint::default(),
            image: PollingConfig::default(),
            voice: PollingConfig::voice_defaults(),
            toast_secs: default_toast_secs(),
        }
    }
}

impl AppConfig {
    /// Load config from disk, or return defaults if not found
    pub fn load() -> Self {
        let path = Self::config_path();
        let mut config = match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                log::debug!("No config at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                log::error!("{}", e);
                Self::default()
            }
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                log::info!("Base URL overridden by {}: {}", BASE_URL_ENV, url);
                config.base_url = url;
            }
        }
        config
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn polling(&self, kind: JobKind) -> &PollingConfig {
        match kind {
            JobKind::Image => &self.image,
            JobKind::Voice => &self.voice,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn toast_lifetime(&self) -> Duration {
        Duration::from_secs(self.toast_secs)
    }

    /// `~/.vprompt`, or `.vprompt` when there is no home directory
    pub fn data_dir() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(".vprompt")
        } else {
            PathBuf::from(".vprompt")
        }
    }

    fn config_path() -> PathBuf {
        Self::data_dir().join(CONFIG_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"base_url":"http://10.0.0.2:8000","image":{"poll_interval_ms":500}}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.2:8000");
        assert_eq!(config.image.poll_interval_ms, 500);
        assert_eq!(config.image.max_result_retries, 10);
        assert_eq!(config.voice, PollingConfig::voice_defaults());
        assert_eq!(config.status_endpoint, StatusEndpoint::Generation);
    }

    #[test]
    fn test_partial_voice_block_keeps_voice_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"voice":{"poll_interval_ms":500}}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.voice.poll_interval_ms, 500);
        assert_eq!(config.voice.min_display_ms, 0);
        assert_eq!(config.voice.max_result_retries, 10);
        assert_eq!(config.image, PollingConfig::default());
    }

    #[test]
    fn test_malformed_config_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    #[allow(deprecated)]
    fn test_status_endpoint_paths() {
        assert_eq!(
            StatusEndpoint::Generation.path("abc123"),
            "/generation_status/abc123"
        );
        assert_eq!(StatusEndpoint::Legacy.path("abc123"), "/job_status/abc123");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let polling = PollingConfig {
            poll_interval_ms: 0,
            ..PollingConfig::default()
        };
        assert_eq!(polling.poll_interval(), Duration::from_millis(1));
    }
}
