//! # Node Configuration
//!
//! Unified configuration for every component of the node.
//!
//! Defaults are suitable for local development. At startup each value can be
//! overridden from an `FT_*` environment variable:
//!
//! | Variable | Section | Default |
//! |----------|---------|---------|
//! | `FT_HTTP_BIND` | server | `0.0.0.0` |
//! | `FT_HTTP_PORT` | server | `8080` |
//! | `FT_REQUEST_TIMEOUT_SECS` | server | `30` |
//! | `FT_QUEUE_TOPIC` | queue | `transactions` |
//! | `FT_QUEUE_CAPACITY` | queue | `1000` |
//! | `FT_ACK_MODE` | queue | `manual` |
//! | `FT_DLQ_CAPACITY` | queue | `100000` |
//! | `FT_QUEUE_BACKEND` | queue | `memory` |
//! | `FT_QUEUE_PATH` | queue | `./data/queue` |
//! | `FT_STORE_BACKEND` | storage | `memory` |
//! | `FT_STORE_PATH` | storage | `./data/transactions` |
//! | `FT_CACHE_MAX_ENTRIES` | cache | `10000` |
//! | `FT_REPORT_TTL_SECS` | cache | `86400` |
//! | `FT_AMOUNT_POLICY` | ingest | `non_zero` |
//! | `FT_PUBLISH_ATTEMPTS` | ingest | `3` |
//! | `FT_MAX_DELIVERIES` | delivery | `5` |
//! | `FT_RETRY_BACKOFF_MS` | delivery | `500` |
//! | `FT_QUERY_TIMEOUT_SECS` | reports | `30` |

use ft_02_report_cache::{DEFAULT_CACHE_CAPACITY, REPORT_TTL};
use shared_bus::{
    AckMode, QueueOptions, DEFAULT_DEAD_LETTER_CAPACITY, DEFAULT_QUEUE_CAPACITY,
    TRANSACTIONS_TOPIC,
};
use shared_types::AmountPolicy;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Queue transport configuration.
    pub queue: QueueConfig,
    /// Transaction store configuration.
    pub storage: StorageConfig,
    /// Report cache configuration.
    pub cache: CacheConfig,
    /// Intake validation and publish retry.
    pub ingest: IngestConfig,
    /// Consumer redelivery behaviour.
    pub delivery: DeliveryConfig,
    /// Report generation.
    pub reports: ReportsConfig,
}

impl NodeConfig {
    /// Reject configurations the node cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - the queue topic is empty
    /// - a queue capacity, cache size, report TTL, publish attempts or max
    ///   deliveries is zero
    /// - a timeout is zero
    /// - the RocksDB backend is selected for the store or the queue in a
    ///   build without the `rocksdb` feature
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::Zero("queue capacity"));
        }
        if self.queue.dead_letter_capacity == 0 {
            return Err(ConfigError::Zero("dead-letter capacity"));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Zero("cache max entries"));
        }
        if self.cache.report_ttl.is_zero() {
            return Err(ConfigError::Zero("report TTL"));
        }
        if self.ingest.publish_attempts == 0 {
            return Err(ConfigError::Zero("publish attempts"));
        }
        if self.delivery.max_deliveries == 0 {
            return Err(ConfigError::Zero("max deliveries"));
        }
        if self.server.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request timeout"));
        }
        if self.reports.query_timeout.is_zero() {
            return Err(ConfigError::Zero("report query timeout"));
        }
        for backend in [self.storage.backend, self.queue.backend] {
            if backend == StoreBackend::RocksDb && !cfg!(feature = "rocksdb") {
                return Err(ConfigError::BackendUnavailable(backend));
            }
        }
        Ok(())
    }

    /// Apply `FT_*` overrides obtained through `lookup`.
    ///
    /// Unset variables keep their current value; set-but-unparseable ones
    /// are an error rather than silently ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = parse_var::<IpAddr, _>(&lookup, "FT_HTTP_BIND")? {
            self.server.bind = bind;
        }
        if let Some(port) = parse_var(&lookup, "FT_HTTP_PORT")? {
            self.server.port = port;
        }
        if let Some(secs) = parse_var(&lookup, "FT_REQUEST_TIMEOUT_SECS")? {
            self.server.request_timeout = Duration::from_secs(secs);
        }

        if let Some(topic) = lookup("FT_QUEUE_TOPIC") {
            self.queue.topic = topic.trim().to_string();
        }
        if let Some(capacity) = parse_var(&lookup, "FT_QUEUE_CAPACITY")? {
            self.queue.capacity = capacity;
        }
        if let Some(mode) = parse_var(&lookup, "FT_ACK_MODE")? {
            self.queue.ack_mode = mode;
        }
        if let Some(capacity) = parse_var(&lookup, "FT_DLQ_CAPACITY")? {
            self.queue.dead_letter_capacity = capacity;
        }
        if let Some(backend) = parse_var(&lookup, "FT_QUEUE_BACKEND")? {
            self.queue.backend = backend;
        }
        if let Some(path) = lookup("FT_QUEUE_PATH") {
            self.queue.path = PathBuf::from(path);
        }

        if let Some(backend) = parse_var(&lookup, "FT_STORE_BACKEND")? {
            self.storage.backend = backend;
        }
        if let Some(path) = lookup("FT_STORE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        if let Some(entries) = parse_var(&lookup, "FT_CACHE_MAX_ENTRIES")? {
            self.cache.max_entries = entries;
        }
        if let Some(secs) = parse_var(&lookup, "FT_REPORT_TTL_SECS")? {
            self.cache.report_ttl = Duration::from_secs(secs);
        }

        if let Some(policy) = parse_var(&lookup, "FT_AMOUNT_POLICY")? {
            self.ingest.amount_policy = policy;
        }
        if let Some(attempts) = parse_var(&lookup, "FT_PUBLISH_ATTEMPTS")? {
            self.ingest.publish_attempts = attempts;
        }

        if let Some(max) = parse_var(&lookup, "FT_MAX_DELIVERIES")? {
            self.delivery.max_deliveries = max;
        }
        if let Some(ms) = parse_var(&lookup, "FT_RETRY_BACKOFF_MS")? {
            self.delivery.retry_backoff = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_var(&lookup, "FT_QUERY_TIMEOUT_SECS")? {
            self.reports.query_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }
}

/// Load configuration from defaults and the process environment, then validate.
pub fn load_config() -> Result<NodeConfig, ConfigError> {
    let mut config = NodeConfig::default();
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        })
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Requests running longer are answered with 408.
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Queue transport configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Topic shared by the gateway and the consumer.
    pub topic: String,
    /// Messages buffered before publishers see `QueueFull`.
    pub capacity: usize,
    /// Records buffered on the dead-letter topic.
    pub dead_letter_capacity: usize,
    pub ack_mode: AckMode,
    /// `RocksDb` journals messages until settled.
    pub backend: StoreBackend,
    /// Journal directory (RocksDB only).
    pub path: PathBuf,
}

impl QueueConfig {
    pub fn options(&self) -> QueueOptions {
        QueueOptions {
            capacity: self.capacity,
            dead_letter_capacity: self.dead_letter_capacity,
            ack_mode: self.ack_mode,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            topic: TRANSACTIONS_TOPIC.to_string(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
            ack_mode: AckMode::Manual,
            backend: StoreBackend::Memory,
            path: PathBuf::from("./data/queue"),
        }
    }
}

/// Which implementation backs the transaction store or the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    #[default]
    Memory,
    RocksDb,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::RocksDb),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::RocksDb => write!(f, "rocksdb"),
        }
    }
}

/// Transaction store configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    /// Database directory (RocksDB only).
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("./data/transactions"),
        }
    }
}

/// Report cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub report_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_CAPACITY,
            report_ttl: REPORT_TTL,
        }
    }
}

/// Intake validation and publish retry.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Applied by both the gateway and the consumer.
    pub amount_policy: AmountPolicy,
    pub publish_attempts: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            amount_policy: AmountPolicy::NonZero,
            publish_attempts: 3,
        }
    }
}

/// Consumer redelivery behaviour.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Deliveries allowed before a message is dead-lettered.
    pub max_deliveries: u32,
    pub retry_backoff: Duration,
    pub persist_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            retry_backoff: Duration::from_millis(500),
            persist_timeout: Duration::from_secs(5),
        }
    }
}

/// Report generation.
#[derive(Debug, Clone)]
pub struct ReportsConfig {
    pub query_timeout: Duration,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("queue topic must not be empty")]
    EmptyTopic,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("backend `{0}` is not compiled into this binary")]
    BackendUnavailable(StoreBackend),
}
