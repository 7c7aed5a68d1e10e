//! Resolver tuning knobs. Everything has a default; a JSON file may
//! override any subset.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::validate::DEFAULT_PRECISION;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub breaker_threshold: u32,
    pub breaker_lock_secs: u64,
    pub cache_ttl_secs: u64,
    pub rate_window_secs: u64,
    pub rate_burst: usize,
    pub primary_timeout_ms: u64,
    pub device_high_timeout_ms: u64,
    pub device_low_timeout_ms: u64,
    pub ip_timeout_ms: u64,
    /// Fixed accuracy (meters) reported for every IP fix.
    pub ip_accuracy_m: f64,
    /// Device fixes better than this are GPS-grade.
    pub gps_grade_threshold_m: f64,
    pub precision_decimals: u32,
    pub primary_endpoint: Option<String>,
    pub ip_endpoint: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            breaker_threshold: 10,
            breaker_lock_secs: 30 * 60,
            cache_ttl_secs: 5 * 60,
            rate_window_secs: 60,
            rate_burst: 5,
            primary_timeout_ms: 3_000,
            device_high_timeout_ms: 15_000,
            device_low_timeout_ms: 10_000,
            ip_timeout_ms: 1_000,
            ip_accuracy_m: 5_000.0,
            gps_grade_threshold_m: 100.0,
            precision_decimals: DEFAULT_PRECISION,
            primary_endpoint: None,
            ip_endpoint: "https://ipapi.co/json/".into(),
        }
    }
}

impl ResolverConfig {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn breaker_lock(&self) -> Duration {
        Duration::from_secs(self.breaker_lock_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn device_high_timeout(&self) -> Duration {
        Duration::from_millis(self.device_high_timeout_ms)
    }

    pub fn device_low_timeout(&self) -> Duration {
        Duration::from_millis(self.device_low_timeout_ms)
    }

    pub fn ip_timeout(&self) -> Duration {
        Duration::from_millis(self.ip_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let c = ResolverConfig::default();
        assert_eq!(c.breaker_threshold, 10);
        assert_eq!(c.breaker_lock(), Duration::from_secs(1800));
        assert_eq!(c.cache_ttl(), Duration::from_secs(300));
        assert_eq!(c.rate_burst, 5);
        assert_eq!(c.primary_timeout(), Duration::from_secs(3));
        assert_eq!(c.ip_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("geofix.json");
        fs::write(&path, r#"{"rate_burst": 8, "primary_endpoint": "http://localhost/fix"}"#).unwrap();

        let c = ResolverConfig::load_from(&path).unwrap();
        assert_eq!(c.rate_burst, 8);
        assert_eq!(c.primary_endpoint.as_deref(), Some("http://localhost/fix"));
        assert_eq!(c.breaker_threshold, 10);
    }

    #[test]
    fn test_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("geofix.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(ResolverConfig::load_from(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(
            ResolverConfig::load_from(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
