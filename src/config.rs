//! Cache configuration

use crate::error::{CacheError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Directory name under the platform data directory
pub const PACKAGE_DIR: &str = "scryfall_cache";

/// Scryfall API root
pub const DEFAULT_BASE_URL: &str = "https://api.scryfall.com";

/// Scryfall asks clients to stay at or below 10 requests per second
pub const DEFAULT_REQUEST_INTERVAL_MS: u64 = 100;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for a [`crate::ScryfallCache`]
///
/// Only `application` is required; it scopes the storage directory so that
/// several programs on one machine keep separate caches.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CacheConfig {
    pub application: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Overrides the platform data directory
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("scryfall_cache/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_interval_ms() -> u64 {
    DEFAULT_REQUEST_INTERVAL_MS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl CacheConfig {
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            version: None,
            root_dir: None,
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            request_interval_ms: default_request_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(dir.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Spacing between requests, rounded up to whole milliseconds
    pub fn request_interval(mut self, interval: Duration) -> Self {
        let millis = interval.as_nanos().div_ceil(1_000_000);
        self.request_interval_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    /// HTTP timeout, rounded up to whole seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout
            .as_secs()
            .saturating_add(u64::from(timeout.subsec_nanos() > 0));
        self
    }

    pub fn request_interval_duration(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the settings before anything touches disk or network
    pub fn validate(&self) -> Result<()> {
        if self.application.trim().is_empty() {
            return Err(CacheError::Config(
                "application name must not be empty".to_string(),
            ));
        }
        let bad_segment = |s: &str| s.contains('/') || s.contains('\\') || s == "." || s == "..";
        if bad_segment(&self.application) {
            return Err(CacheError::Config(format!(
                "application name is not a valid directory name: {:?}",
                self.application
            )));
        }
        if let Some(version) = &self.version {
            if version.is_empty() || bad_segment(version) {
                return Err(CacheError::Config(format!(
                    "version is not a valid directory name: {:?}",
                    version
                )));
            }
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(CacheError::Config(format!(
                "base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(CacheError::Config(
                "timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the namespace directory:
    /// `<data_dir>/scryfall_cache/<application>[/<version>]`
    pub fn cache_dir(&self) -> PathBuf {
        let base = self.root_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(PACKAGE_DIR)
        });
        let dir = base.join(&self.application);
        match &self.version {
            Some(version) => dir.join(version),
            None => dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::new("deckbuilder");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_interval_duration(), Duration::from_millis(100));
        assert!(config.user_agent.starts_with("scryfall_cache/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_dir_scoped_by_application_and_version() {
        let config = CacheConfig::new("deckbuilder").root_dir("/tmp/cards");
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/cards/deckbuilder"));

        let config = config.version("1.2");
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/cards/deckbuilder/1.2"));
    }

    #[test]
    fn test_default_cache_dir_uses_package_dir() {
        let config = CacheConfig::new("deckbuilder");
        assert!(config.cache_dir().ends_with("scryfall_cache/deckbuilder"));
    }

    #[test]
    fn test_validate_rejects_bad_application() {
        assert!(CacheConfig::new("").validate().is_err());
        assert!(CacheConfig::new("../escape").validate().is_err());
        assert!(CacheConfig::new("..").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let config = CacheConfig::new("app").base_url("ftp://example.com");
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_sub_second_durations_round_up() {
        let config = CacheConfig::new("app")
            .timeout(Duration::from_millis(500))
            .request_interval(Duration::from_micros(1500));
        assert_eq!(config.timeout_duration(), Duration::from_secs(1));
        assert_eq!(config.request_interval_ms, 2);
        assert!(config.validate().is_ok());

        let config = CacheConfig::new("app").timeout(Duration::from_millis(2500));
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = CacheConfig::new("app").timeout(Duration::ZERO);
        assert_eq!(config.timeout_secs, 0);
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{ "application": "app", "request_interval_ms": 250 }"#)
                .unwrap();
        assert_eq!(config.application, "app");
        assert_eq!(config.request_interval_ms, 250);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
