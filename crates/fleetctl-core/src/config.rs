//! Layered configuration (spec §6), grounded on the teacher's use of the
//! `config` crate to merge defaults, a file and environment overrides into
//! one typed tree instead of hand-rolling `std::env::var` parsing.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeartbeatConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(10), request_timeout: Duration::from_secs(5) }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub jitter_factor: f64,
    pub max_retry_percentage: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter_factor: 0.5,
            max_retry_percentage: 20.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    pub sliding_window_size: usize,
    pub minimum_calls: usize,
    pub failure_rate_threshold: f32,
    pub slow_call_rate_threshold: f32,
    #[serde(with = "humantime_serde")]
    pub slow_call_duration: Duration,
    pub permitted_calls_in_half_open: usize,
    #[serde(with = "humantime_serde")]
    pub wait_duration_in_open_state: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 0.5,
            slow_call_rate_threshold: 0.8,
            slow_call_duration: Duration::from_secs(1),
            permitted_calls_in_half_open: 3,
            wait_duration_in_open_state: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkheadConfig {
    pub max_concurrent_calls: usize,
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent_calls: 32, max_wait: Duration::from_millis(500) }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub bulkhead: BulkheadConfig,
    #[serde(with = "humantime_serde")]
    pub time_limit: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            bulkhead: BulkheadConfig::default(),
            time_limit: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    Local,
    Distributed,
    Tiered,
    Noop,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub mode: CacheMode,
    pub local_capacity: u64,
    #[serde(with = "humantime_serde")]
    pub local_ttl: Duration,
    pub compression_threshold_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::Tiered,
            local_capacity: 10_000,
            local_ttl: Duration::from_secs(60),
            compression_threshold_bytes: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerPolicyKind {
    RoundRobin,
    Random,
    WeightedRandom,
    Rendezvous,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadBalancerConfig {
    pub policy: LoadBalancerPolicyKind,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self { policy: LoadBalancerPolicyKind::RoundRobin }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerConfig {
    pub concurrency: usize,
    pub max_poll_records: usize,
    pub fetch_min_bytes: usize,
    #[serde(with = "humantime_serde")]
    pub fetch_max_wait: Duration,
    pub max_retries: u32,
    pub dlq_topic: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_poll_records: 100,
            fetch_min_bytes: 1024,
            fetch_max_wait: Duration::from_millis(500),
            max_retries: 3,
            dlq_topic: "heartbeats.dlq".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectionConfig {
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub miss_threshold: Duration,
    #[serde(with = "humantime_serde")]
    pub retirement_threshold: Duration,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            miss_threshold: Duration::from_secs(60),
            retirement_threshold: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApprovalConfig {
    #[serde(with = "humantime_serde")]
    pub expiry_window: Duration,
    #[serde(with = "humantime_serde")]
    pub expiry_sweep_interval: Duration,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { expiry_window: Duration::from_secs(7 * 24 * 3600), expiry_sweep_interval: Duration::from_secs(60) }
    }
}

/// Root configuration tree (spec §6). Field names mirror the dotted keys
/// read from file/environment sources (`app.heartbeat.*`, `resilience.*`,
/// `cache.*`, `loadbalancer.policy`, `consumer.*`).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FleetConfig {
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub loadbalancer: LoadBalancerConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
}

impl FleetConfig {
    /// Loads defaults, then an optional file at `path` (when it exists),
    /// then environment variables prefixed `FLEETCTL__` with `__` as the
    /// nesting separator (e.g. `FLEETCTL__RESILIENCE__RETRY__MAX_ATTEMPTS`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&FleetConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(false));
        }
        builder = builder.add_source(Environment::with_prefix("FLEETCTL").separator("__"));
        builder.build()?.try_deserialize()
    }
}
