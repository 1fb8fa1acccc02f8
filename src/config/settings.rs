use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Digest cycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    /// Whether scheduled digests fire at all (manual triggers always work)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (seconds-first, e.g. "0 0 8 * * * *"); takes precedence over the interval
    #[serde(default)]
    pub cron: Option<String>,
    /// Fixed interval in seconds, used when no cron expression is set
    #[serde(default = "default_digest_interval")]
    pub interval_seconds: u64,
    /// Upper bound for a single provider send
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
    /// Maximum notifications included in one digest
    #[serde(default)]
    pub max_items: Option<usize>,
    /// "at_least_one" (default) or "all_providers"
    #[serde(default = "default_retirement_policy")]
    pub retirement_policy: String,
}

fn default_true() -> bool {
    true
}

fn default_digest_interval() -> u64 {
    86400 // once a day
}

fn default_send_timeout() -> u64 {
    30
}

fn default_retirement_policy() -> String {
    "at_least_one".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// "memory" (default) or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
}

fn default_store_backend() -> String {
    "memory".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

fn default_database_url() -> String {
    "postgres://localhost:5432/garage".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_idle_timeout() -> u64 {
    300
}

/// A delivery provider declared in configuration and seeded into the registry at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Read or digested notifications older than this are purged
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_retention_interval")]
    pub interval_seconds: u64,
}

fn default_retention_days() -> u32 {
    90
}

fn default_retention_interval() -> u64 {
    3600 // 1 hour
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "vehicle-digest-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("digest.enabled", true)?
            .set_default("digest.interval_seconds", 86400)?
            .set_default("digest.send_timeout_seconds", 30)?
            .set_default("store.backend", "memory")?
            .set_default("retention.retention_days", 90)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_PORT, DIGEST_CRON, STORE_BACKEND, DATABASE_URL, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: None,
            interval_seconds: default_digest_interval(),
            send_timeout_seconds: default_send_timeout(),
            max_items: None,
            retirement_policy: default_retirement_policy(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: default_retention_days(),
            interval_seconds: default_retention_interval(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
