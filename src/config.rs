//! Configuration management.

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Health server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Queue consumer configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Delivery provider configuration
    #[serde(default)]
    pub resend: ResendConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

/// Policy for the consumer loop and recovery sweep.
///
/// Passed by reference into the consumer, sweeper, and stats components at
/// construction; nothing reads queue policy from ambient state.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// When false, neither the consumer loop nor the sweep is started
    #[serde(default = "default_queue_enabled")]
    pub enabled: bool,

    /// Attempt budget before a job is dead-lettered
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sustained delivery rate, kept below the provider ceiling
    #[serde(default = "default_emails_per_second")]
    pub emails_per_second: f64,

    /// Bounded wait on the blocking pop, in seconds
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Base delay for exponential retry backoff, in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Period of the stranded-job recovery sweep, in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Prefix for the four queue list keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: default_queue_enabled(),
            max_attempts: default_max_attempts(),
            emails_per_second: default_emails_per_second(),
            poll_timeout_secs: default_poll_timeout_secs(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendConfig {
    /// Provider API key; required when the queue is enabled
    pub api_key: Option<String>,

    /// Provider API base URL
    #[serde(default = "default_resend_base_url")]
    pub base_url: String,

    /// Sender used when a job carries no `from` address
    #[serde(default = "default_from_address")]
    pub default_from: String,
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_resend_base_url(),
            default_from: default_from_address(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_queue_enabled() -> bool { true }
fn default_max_attempts() -> u32 { 3 }
// Resend allows 2/sec but measures per calendar second, so stay under it.
fn default_emails_per_second() -> f64 { 1.67 }
fn default_poll_timeout_secs() -> u64 { 5 }
fn default_retry_base_delay_ms() -> u64 { 1000 }
fn default_sweep_interval_ms() -> u64 { 300_000 }
fn default_key_prefix() -> String { "mailroom:emails".to_string() }
fn default_resend_base_url() -> String { "https://api.resend.com".to_string() }
fn default_from_address() -> String { "Mailroom <no-reply@localhost>".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MAILROOM").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("MAILROOM").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}
