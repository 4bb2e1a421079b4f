use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Process-local store, cache and notifier. Nothing survives a restart.
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_listing_ttl")]
    pub listing_ttl_seconds: u64,
    #[serde(default = "default_rider_ttl")]
    pub rider_ttl_seconds: u64,
    #[serde(default = "default_op_timeout")]
    pub op_timeout_ms: u64,
}

fn default_listing_ttl() -> u64 { 60 }
fn default_rider_ttl() -> u64 { 30 }
fn default_op_timeout() -> u64 { 250 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl_seconds: default_listing_ttl(),
            rider_ttl_seconds: default_rider_ttl(),
            op_timeout_ms: default_op_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BusinessRules {
    #[serde(default = "default_booking_limit")]
    pub booking_limit: usize,
    #[serde(default = "default_conflict_window")]
    pub time_conflict_window_minutes: i64,
    /// Extra claim attempts after a lost update. 0 fails closed immediately.
    #[serde(default)]
    pub claim_retry_attempts: u32,
}

fn default_booking_limit() -> usize { 5 }
fn default_conflict_window() -> i64 { 120 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            booking_limit: default_booking_limit(),
            time_conflict_window_minutes: default_conflict_window(),
            claim_retry_attempts: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RulesConfig {
    /// JSON rule table replacing the built-in one.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String { "ride.events".to_string() }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, e.g. config/memory.toml
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // CONVOY__CACHE__OP_TIMEOUT_MS=500 sets cache.op_timeout_ms
            .add_source(config::Environment::with_prefix("CONVOY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
