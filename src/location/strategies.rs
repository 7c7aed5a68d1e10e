//! Position strategies: one per provider, tried in fixed priority order.
//!
//! Every strategy races its provider call against a timer. The loser is
//! dropped; a provider call that loses is not interrupted at the transport
//! level, its result is simply never read.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::config::ResolverConfig;
use super::types::{
    AccuracyGrade, Fix, LocateRequest, ProviderError, ProviderKind, RawFix, StrategyError,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const PRIMARY_NETWORK: &str = "primary_network";
pub const DEVICE_SENSOR: &str = "device_sensor";
pub const IP_GEOLOCATION: &str = "ip_geolocation";
pub const CELL_TOWER: &str = "cell_tower";

/// A concrete positioning backend. Transport, auth and payload format are
/// the implementor's business.
pub trait ProviderClient: Send + Sync {
    fn locate(&self, request: LocateRequest) -> BoxFuture<'_, Result<RawFix, ProviderError>>;
}

/// One link of the fallback chain.
///
/// `resolve` must not panic; every failure comes back as a [`StrategyError`].
pub trait PositionStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn resolve(&self) -> BoxFuture<'_, Result<Fix, StrategyError>>;
}

/// Run one provider call against its timeout.
async fn race(client: &dyn ProviderClient, request: LocateRequest) -> Result<RawFix, ProviderError> {
    match tokio::time::timeout(request.timeout, client.locate(request)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout),
    }
}

fn to_strategy_error(e: ProviderError, request: &LocateRequest) -> StrategyError {
    match e {
        ProviderError::Timeout => StrategyError::Timeout {
            after: request.timeout,
        },
        other => other.into(),
    }
}

fn positive_accuracy(raw: &RawFix) -> Option<f64> {
    raw.accuracy.filter(|a| a.is_finite() && *a > 0.0)
}

/// Classify a device reading as GPS-grade or network-grade.
pub fn classify_accuracy(accuracy: f64, gps_threshold_m: f64) -> AccuracyGrade {
    if accuracy < gps_threshold_m {
        AccuracyGrade::Gps
    } else {
        AccuracyGrade::Network
    }
}

// ─── Primary network provider ───────────────────────────────────

/// Highest-accuracy network provider behind a short timeout.
pub struct PrimaryNetworkStrategy {
    client: Arc<dyn ProviderClient>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl PrimaryNetworkStrategy {
    pub fn new(client: Arc<dyn ProviderClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used to stamp fixes the provider left unstamped.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn run(&self) -> Result<Fix, StrategyError> {
        let request = LocateRequest {
            high_accuracy: true,
            timeout: self.timeout,
        };
        let raw = race(self.client.as_ref(), request)
            .await
            .map_err(|e| to_strategy_error(e, &request))?;
        if positive_accuracy(&raw).is_none() {
            return Err(StrategyError::InvalidCoordinates(format!(
                "accuracy must be > 0, got {:?}",
                raw.accuracy
            )));
        }
        let mut fix = Fix::from_raw(raw, PRIMARY_NETWORK, ProviderKind::Network, self.clock.now_ms());
        fix.grade = Some(AccuracyGrade::Network);
        Ok(fix)
    }
}

impl PositionStrategy for PrimaryNetworkStrategy {
    fn name(&self) -> &str {
        PRIMARY_NETWORK
    }

    fn resolve(&self) -> BoxFuture<'_, Result<Fix, StrategyError>> {
        Box::pin(self.run())
    }
}

// ─── Device sensor ──────────────────────────────────────────────

/// On-device sensor with two-tier accuracy negotiation: high accuracy
/// first, then one retry at reduced accuracy on timeout or unavailability.
/// Permission denial is final.
pub struct DeviceSensorStrategy {
    client: Arc<dyn ProviderClient>,
    high_timeout: Duration,
    low_timeout: Duration,
    gps_threshold_m: f64,
    clock: Arc<dyn Clock>,
}

impl DeviceSensorStrategy {
    pub fn new(
        client: Arc<dyn ProviderClient>,
        high_timeout: Duration,
        low_timeout: Duration,
        gps_threshold_m: f64,
    ) -> Self {
        Self {
            client,
            high_timeout,
            low_timeout,
            gps_threshold_m,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn run(&self) -> Result<Fix, StrategyError> {
        let high = LocateRequest {
            high_accuracy: true,
            timeout: self.high_timeout,
        };
        let raw = match race(self.client.as_ref(), high).await {
            Ok(raw) => raw,
            Err(e @ (ProviderError::Timeout | ProviderError::Unavailable(_))) => {
                debug!(error = %e, "High-accuracy sensing failed, retrying at reduced accuracy");
                let low = LocateRequest {
                    high_accuracy: false,
                    timeout: self.low_timeout,
                };
                race(self.client.as_ref(), low)
                    .await
                    .map_err(|e| to_strategy_error(e, &low))?
            }
            Err(e) => return Err(to_strategy_error(e, &high)),
        };

        let grade = positive_accuracy(&raw).map(|a| classify_accuracy(a, self.gps_threshold_m));
        let mut fix = Fix::from_raw(raw, DEVICE_SENSOR, ProviderKind::Device, self.clock.now_ms());
        fix.grade = grade;
        Ok(fix)
    }
}

impl PositionStrategy for DeviceSensorStrategy {
    fn name(&self) -> &str {
        DEVICE_SENSOR
    }

    fn resolve(&self) -> BoxFuture<'_, Result<Fix, StrategyError>> {
        Box::pin(self.run())
    }
}

// ─── IP geolocation ─────────────────────────────────────────────

/// Coarse IP-based lookup. Always reports the same large accuracy.
pub struct IpGeolocationStrategy {
    client: Arc<dyn ProviderClient>,
    timeout: Duration,
    accuracy_m: f64,
    clock: Arc<dyn Clock>,
}

impl IpGeolocationStrategy {
    pub fn new(client: Arc<dyn ProviderClient>, timeout: Duration, accuracy_m: f64) -> Self {
        Self {
            client,
            timeout,
            accuracy_m,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn run(&self) -> Result<Fix, StrategyError> {
        let request = LocateRequest {
            high_accuracy: false,
            timeout: self.timeout,
        };
        let raw = race(self.client.as_ref(), request)
            .await
            .map_err(|e| to_strategy_error(e, &request))?;
        let mut fix = Fix::from_raw(raw, IP_GEOLOCATION, ProviderKind::Ip, self.clock.now_ms());
        fix.accuracy = Some(self.accuracy_m);
        fix.grade = Some(AccuracyGrade::Coarse);
        Ok(fix)
    }
}

impl PositionStrategy for IpGeolocationStrategy {
    fn name(&self) -> &str {
        IP_GEOLOCATION
    }

    fn resolve(&self) -> BoxFuture<'_, Result<Fix, StrategyError>> {
        Box::pin(self.run())
    }
}

// ─── Cell tower ─────────────────────────────────────────────────

/// Cellular radio metadata is not reachable from this host, so this always
/// fails. Kept in the chain for platforms that can supply it.
#[derive(Debug, Default)]
pub struct CellTowerStrategy;

impl PositionStrategy for CellTowerStrategy {
    fn name(&self) -> &str {
        CELL_TOWER
    }

    fn resolve(&self) -> BoxFuture<'_, Result<Fix, StrategyError>> {
        Box::pin(async {
            Err(StrategyError::Unsupported(
                "cell tower positioning is not available on this platform".into(),
            ))
        })
    }
}

/// The standard chain in priority order: primary, device sensor, IP, cell tower.
///
/// `clock` stamps fixes that arrive without a provider timestamp; pass the
/// same clock the resolver uses.
pub fn default_chain(
    primary: Arc<dyn ProviderClient>,
    device: Arc<dyn ProviderClient>,
    ip: Arc<dyn ProviderClient>,
    config: &ResolverConfig,
    clock: Arc<dyn Clock>,
) -> Vec<Box<dyn PositionStrategy>> {
    vec![
        Box::new(
            PrimaryNetworkStrategy::new(primary, config.primary_timeout()).with_clock(clock.clone()),
        ),
        Box::new(
            DeviceSensorStrategy::new(
                device,
                config.device_high_timeout(),
                config.device_low_timeout(),
                config.gps_grade_threshold_m,
            )
            .with_clock(clock.clone()),
        ),
        Box::new(
            IpGeolocationStrategy::new(ip, config.ip_timeout(), config.ip_accuracy_m)
                .with_clock(clock),
        ),
        Box::new(CellTowerStrategy),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub enum Step {
        Reply(Result<RawFix, ProviderError>),
        Hang,
    }

    /// Replays a fixed script of replies and records every request.
    pub struct ScriptedClient {
        steps: Mutex<VecDeque<Step>>,
        requests: Mutex<Vec<LocateRequest>>,
    }

    impl ScriptedClient {
        pub fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn requests(&self) -> Vec<LocateRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl ProviderClient for ScriptedClient {
        fn locate(&self, request: LocateRequest) -> BoxFuture<'_, Result<RawFix, ProviderError>> {
            self.requests.lock().unwrap().push(request);
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Step::Reply(Err(ProviderError::Unavailable("script exhausted".into()))));
            Box::pin(async move {
                match step {
                    Step::Reply(r) => r,
                    Step::Hang => std::future::pending().await,
                }
            })
        }
    }
}
