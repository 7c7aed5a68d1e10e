//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which kind of provider produced a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Network,
    Device,
    Ip,
    CellTower,
}

impl ProviderKind {
    /// Network and device fixes must report a positive accuracy.
    pub fn requires_accuracy(self) -> bool {
        matches!(self, Self::Network | Self::Device)
    }
}

/// Coarse classification of a fix's accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyGrade {
    Gps,
    Network,
    Coarse,
}

impl fmt::Display for AccuracyGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gps => write!(f, "GPS"),
            Self::Network => write!(f, "Network"),
            Self::Coarse => write!(f, "Coarse"),
        }
    }
}

/// A single resolved position reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Meters. Mandatory for network and device fixes.
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    /// Name of the strategy that produced the fix.
    pub provider: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub grade: Option<AccuracyGrade>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Fix {
    /// Build a fix from a provider reading, stamped `now_ms` if the provider gave no time.
    pub fn from_raw(raw: RawFix, provider: &str, kind: ProviderKind, now_ms: i64) -> Self {
        Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            altitude: raw.altitude,
            accuracy: raw.accuracy,
            speed: raw.speed,
            heading: raw.heading,
            provider: provider.to_string(),
            kind,
            grade: None,
            timestamp: raw.timestamp.unwrap_or(now_ms),
        }
    }

    pub fn display_line(&self) -> String {
        let accuracy = match self.accuracy {
            Some(a) => format!(" \u{00B1}{:.0} m", a),
            None => String::new(),
        };
        let grade = match self.grade {
            Some(g) => format!(" [{}]", g),
            None => String::new(),
        };
        format!(
            "{:.3}, {:.3}{}{} via {}",
            self.latitude, self.longitude, accuracy, grade, self.provider
        )
    }
}

/// What a provider client hands back before any validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// Parameters a strategy passes to its provider client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocateRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
}

/// Options for a single `get_current_location` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocateOptions {
    /// Skip the cache read. The breaker and rate limiter still apply.
    pub force_refresh: bool,
}

/// Where a returned fix came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Cache,
    Strategy(String),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cache => "cache",
            Self::Strategy(name) => name,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub fix: Fix,
    pub source: Source,
}

/// Errors reported by a provider client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider timed out")]
    Timeout,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Per-strategy failures. Never reach the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<ProviderError> for StrategyError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Timeout => Self::ProviderUnavailable("provider reported timeout".into()),
            ProviderError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            ProviderError::Unavailable(msg) | ProviderError::Http(msg) => {
                Self::ProviderUnavailable(msg)
            }
            ProviderError::InvalidResponse(msg) => {
                Self::ProviderUnavailable(format!("invalid payload: {}", msg))
            }
        }
    }
}

/// Failures surfaced to callers of `get_current_location`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("rate limited: too many location requests, retry in {}s", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },
    #[error("location service locked after repeated failures, retry in {}s", .remaining.as_secs().max(1))]
    CircuitOpen {
        remaining: Duration,
        /// Epoch milliseconds at which the lock expires.
        locked_until_ms: i64,
    },
    #[error("all {attempts} location providers failed; last error: {last_error}")]
    AllProvidersFailed { attempts: usize, last_error: String },
}

impl ResolveError {
    /// How long the caller should wait before retrying, if known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            Self::CircuitOpen { remaining, .. } => Some(*remaining),
            Self::AllProvidersFailed { .. } => None,
        }
    }
}

/// Serializable envelope for upper layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Fix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl From<Result<Resolution, ResolveError>> for LocationResponse {
    fn from(result: Result<Resolution, ResolveError>) -> Self {
        match result {
            Ok(res) => Self {
                success: true,
                source: Some(res.source.as_str().to_string()),
                data: Some(res.fix),
                error: None,
                retry_after_ms: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                source: None,
                retry_after_ms: e.retry_after().map(|d| d.as_millis() as u64),
                error: Some(e.to_string()),
            },
        }
    }
}
