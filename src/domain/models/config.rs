use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Main configuration structure for fleetmon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Monitoring bulk-change API
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Inventory query API
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Batch fan-out
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Reconciliation loop
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Client-side rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Login credentials. The password never appears in `Debug` output.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Monitoring API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitoringConfig {
    /// Base URL; bulk endpoints live under `/bulk/entity/svc/`
    #[serde(default = "default_monitoring_url")]
    pub base_url: String,

    #[serde(default)]
    pub credentials: Credentials,

    /// Read timeout of the first attempt, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Added to the read timeout after each timed-out attempt
    #[serde(default = "default_timeout_increment_secs")]
    pub timeout_increment_secs: u64,

    /// Timeouts above this are not attempted
    #[serde(default = "default_timeout_ceiling_secs")]
    pub timeout_ceiling_secs: u64,

    /// Retry a timed-out call with a longer timeout
    #[serde(default = "default_true")]
    pub retry_on_timeout: bool,

    /// Logins attempted before giving up on a 401
    #[serde(default = "default_auth_attempts")]
    pub auth_attempts: u32,

    /// Connect timeout, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_monitoring_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    120
}

const fn default_timeout_increment_secs() -> u64 {
    60
}

const fn default_timeout_ceiling_secs() -> u64 {
    180
}

const fn default_true() -> bool {
    true
}

const fn default_auth_attempts() -> u32 {
    3
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            base_url: default_monitoring_url(),
            credentials: Credentials::default(),
            request_timeout_secs: default_request_timeout_secs(),
            timeout_increment_secs: default_timeout_increment_secs(),
            timeout_ceiling_secs: default_timeout_ceiling_secs(),
            retry_on_timeout: true,
            auth_attempts: default_auth_attempts(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Inventory API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InventoryConfig {
    #[serde(default = "default_inventory_url")]
    pub base_url: String,

    /// Rows requested per page, also the entities per query batch
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pages fetched before pagination is treated as runaway
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Request timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_inventory_url() -> String {
    "http://localhost:8081".to_string()
}

const fn default_page_size() -> usize {
    5000
}

const fn default_max_pages() -> u32 {
    40
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_inventory_url(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatchConfig {
    /// Workers in flight at once
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Entities per monitoring API call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

const fn default_max_workers() -> usize {
    50
}

const fn default_batch_size() -> usize {
    500
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            batch_size: default_batch_size(),
        }
    }
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconcileConfig {
    /// Retry rounds after the first change call
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Pause between a change call and its validation query, in milliseconds
    #[serde(default)]
    pub settle_delay_ms: u64,
}

const fn default_retry_budget() -> u32 {
    2
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            retry_budget: default_retry_budget(),
            settle_delay_ms: 0,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> f64 {
    20.0
}

const fn default_burst_size() -> u32 {
    50
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
