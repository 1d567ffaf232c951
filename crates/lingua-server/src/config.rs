//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Audio object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External speech/ML service endpoints.
    #[serde(default)]
    pub services: ServicesConfig,

    /// Billing settings.
    #[serde(default)]
    pub billing: BillingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL used in external-audience signed media URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Base URL backend services use to reach this server for media.
    #[serde(default = "default_internal_base_url")]
    pub internal_base_url: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "lingua_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Audio object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory audio objects are stored under.
    #[serde(default = "default_storage_root")]
    pub root: String,

    /// Secret used to sign media URLs. Must be set to a strong value in
    /// production; the default only makes local development work.
    #[serde(default = "default_storage_secret")]
    pub secret: String,
}

/// Endpoints for external collaborator services.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// Base URL of the speech-to-text service.
    #[serde(default = "default_stt_url")]
    pub stt_url: String,

    /// Base URL of the ML service (reply generation and scoring).
    #[serde(default = "default_ml_url")]
    pub ml_url: String,

    /// Base URL of the speech-synthesis service.
    #[serde(default = "default_tts_url")]
    pub tts_url: String,

    /// Language code passed to the pronunciation scorer.
    #[serde(default = "default_language")]
    pub language: String,
}

/// Billing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Credits charged per completed voice turn.
    #[serde(default = "default_credit_cost_per_turn")]
    pub credit_cost_per_turn: i64,

    /// Maximum accepted audio upload size in bytes.
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_internal_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_db_path() -> String {
    "lingua.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_root() -> String {
    "media".to_string()
}

fn default_storage_secret() -> String {
    "dev-only-secret".to_string()
}

fn default_stt_url() -> String {
    "http://localhost:9001".to_string()
}

fn default_ml_url() -> String {
    "http://localhost:9002".to_string()
}

fn default_tts_url() -> String {
    "http://localhost:9003".to_string()
}

fn default_language() -> String {
    "en-us".to_string()
}

fn default_credit_cost_per_turn() -> i64 {
    lingua_types::DEFAULT_CREDIT_COST_PER_TURN
}

fn default_max_audio_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            internal_base_url: default_internal_base_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            secret: default_storage_secret(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            stt_url: default_stt_url(),
            ml_url: default_ml_url(),
            tts_url: default_tts_url(),
            language: default_language(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            credit_cost_per_turn: default_credit_cost_per_turn(),
            max_audio_bytes: default_max_audio_bytes(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `LINGUA_HOST` overrides `server.host`
/// - `LINGUA_PORT` overrides `server.port`
/// - `LINGUA_PUBLIC_BASE_URL` overrides `server.public_base_url`
/// - `LINGUA_INTERNAL_BASE_URL` overrides `server.internal_base_url`
/// - `LINGUA_DB_PATH` overrides `database.path`
/// - `LINGUA_LOG_LEVEL` overrides `logging.level`
/// - `LINGUA_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `LINGUA_STORAGE_ROOT` overrides `storage.root`
/// - `LINGUA_STORAGE_SECRET` overrides `storage.secret`
/// - `LINGUA_STT_URL`, `LINGUA_ML_URL`, `LINGUA_TTS_URL` override the
///   corresponding service endpoints
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("LINGUA_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("LINGUA_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(url) = std::env::var("LINGUA_PUBLIC_BASE_URL") {
        config.server.public_base_url = url;
    }
    if let Ok(url) = std::env::var("LINGUA_INTERNAL_BASE_URL") {
        config.server.internal_base_url = url;
    }
    if let Ok(db_path) = std::env::var("LINGUA_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("LINGUA_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("LINGUA_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(root) = std::env::var("LINGUA_STORAGE_ROOT") {
        config.storage.root = root;
    }
    if let Ok(secret) = std::env::var("LINGUA_STORAGE_SECRET") {
        config.storage.secret = secret;
    }
    if let Ok(url) = std::env::var("LINGUA_STT_URL") {
        config.services.stt_url = url;
    }
    if let Ok(url) = std::env::var("LINGUA_ML_URL") {
        config.services.ml_url = url;
    }
    if let Ok(url) = std::env::var("LINGUA_TTS_URL") {
        config.services.tts_url = url;
    }

    Ok(config)
}
