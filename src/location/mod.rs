//! Position resolution subsystem.
//!
//! Tries a prioritized chain of positioning providers behind a circuit
//! breaker, a sliding-window rate limiter and a short-TTL result cache.
//! Every fix is validated and desensitized before it leaves.

pub mod breaker;
pub mod cache;
pub mod clock;
pub mod config;
pub mod providers;
pub mod rate_limit;
pub mod resolver;
pub mod store;
pub mod strategies;
pub mod types;
pub mod validate;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ResolverConfig};
pub use providers::{HttpJsonClient, IpApiClient, UnavailableClient};
pub use resolver::LocationResolver;
pub use store::{FileStore, MemoryStore, StateStore};
pub use strategies::{default_chain, PositionStrategy, ProviderClient};
pub use types::{
    AccuracyGrade, Fix, LocateOptions, LocationResponse, ProviderError, ProviderKind, RawFix,
    Resolution, ResolveError, Source, StrategyError,
};
