//! Concrete provider clients: a generic HTTP JSON endpoint, ipapi.co-style
//! IP geolocation, and a stand-in for hosts without a capability.
//!
//! HTTP calls use blocking `ureq` on tokio's blocking pool. The agent
//! timeout matches the request timeout so a call abandoned by its strategy
//! still ends on its own.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::strategies::{BoxFuture, ProviderClient};
use super::types::{LocateRequest, ProviderError, RawFix};

const USER_AGENT: &str = concat!("geofix/", env!("CARGO_PKG_VERSION"));

fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

fn get_json<T: serde::de::DeserializeOwned>(url: &str, timeout: Duration) -> Result<T, ProviderError> {
    let response = agent(timeout).get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => ProviderError::Http(format!("status {} from {}", code, url)),
        ureq::Error::Transport(t) => ProviderError::Http(t.to_string()),
    })?;
    response
        .into_json()
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Run a blocking fetch off the async runtime.
async fn blocking<F>(f: F) -> Result<RawFix, ProviderError>
where
    F: FnOnce() -> Result<RawFix, ProviderError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ProviderError::Unavailable(format!("provider task failed: {}", e)))?
}

// ─── HTTP JSON provider ─────────────────────────────────────────

/// Any endpoint that answers GET with
/// `{latitude, longitude, accuracy, altitude?, speed?, heading?}`.
pub struct HttpJsonClient {
    url: String,
}

impl HttpJsonClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl ProviderClient for HttpJsonClient {
    fn locate(&self, request: LocateRequest) -> BoxFuture<'_, Result<RawFix, ProviderError>> {
        let url = self.url.clone();
        Box::pin(async move {
            debug!(url = %url, "Querying network provider");
            blocking(move || get_json::<RawFix>(&url, request.timeout)).await
        })
    }
}

// ─── IP-based geolocation ───────────────────────────────────────

#[derive(Deserialize)]
struct IpApiResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    error: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
}

impl IpApiResult {
    fn into_raw(self) -> Result<RawFix, ProviderError> {
        if self.error.unwrap_or(false) {
            return Err(ProviderError::Unavailable(
                self.reason.unwrap_or_else(|| "lookup refused".into()),
            ));
        }
        let lat = self
            .latitude
            .ok_or_else(|| ProviderError::InvalidResponse("no latitude".into()))?;
        let lon = self
            .longitude
            .ok_or_else(|| ProviderError::InvalidResponse("no longitude".into()))?;
        Ok(RawFix::new(lat, lon))
    }
}

/// ipapi.co-style IP geolocation. Reports no accuracy of its own.
pub struct IpApiClient {
    url: String,
}

impl IpApiClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl ProviderClient for IpApiClient {
    fn locate(&self, request: LocateRequest) -> BoxFuture<'_, Result<RawFix, ProviderError>> {
        let url = self.url.clone();
        Box::pin(async move {
            debug!(url = %url, "Querying IP geolocation");
            blocking(move || get_json::<IpApiResult>(&url, request.timeout)?.into_raw()).await
        })
    }
}

// ─── Unavailable capability ─────────────────────────────────────

/// For hosts that lack a capability entirely (e.g. no location sensor).
pub struct UnavailableClient {
    reason: String,
}

impl UnavailableClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ProviderClient for UnavailableClient {
    fn locate(&self, _request: LocateRequest) -> BoxFuture<'_, Result<RawFix, ProviderError>> {
        let reason = self.reason.clone();
        Box::pin(async move { Err(ProviderError::Unavailable(reason)) })
    }
}
