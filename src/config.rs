// Configuration File Support
//
// This module provides configuration file parsing for the notification gate.
// Supports TOML format with environment variable overrides.
// The quota table comes from `[quotas.*]` sections, an optional JSON quota
// file, or the embedded default when neither is given.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::rate_limit::{QuotaTable, RawQuota, DEFAULT_KEY_PREFIX};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Counter store configuration
    pub store: StoreConfig,

    /// Per-category quotas
    pub quotas: HashMap<String, RawQuota>,

    /// JSON quota file, replaces `quotas` when set
    pub quota_file: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: String,

    /// Bound on a single counter store call, in milliseconds
    pub store_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            store_timeout_ms: 2000,
        }
    }
}

/// Counter store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared Redis counters
    Redis,
    /// Process-local counters
    Memory,
}

/// Counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend kind
    pub backend: StoreBackend,

    /// Redis connection URL
    pub redis_url: String,

    /// Namespace prepended to every counter key
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            quotas: HashMap::new(),
            quota_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or is
    /// invalid. If the config file does not exist, returns default
    /// configuration with environment overrides applied.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - NOTIFICATION_GATE_LOG_LEVEL
    /// - NOTIFICATION_GATE_LOG_FORMAT
    /// - NOTIFICATION_GATE_LISTEN_ADDR
    /// - NOTIFICATION_GATE_STORE_TIMEOUT_MS
    /// - NOTIFICATION_GATE_STORE_BACKEND
    /// - NOTIFICATION_GATE_REDIS_URL
    /// - NOTIFICATION_GATE_QUOTA_FILE
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("NOTIFICATION_GATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("NOTIFICATION_GATE_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(addr) = std::env::var("NOTIFICATION_GATE_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(timeout) = std::env::var("NOTIFICATION_GATE_STORE_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.server.store_timeout_ms = timeout;
                }
            }
        }

        if let Ok(backend) = std::env::var("NOTIFICATION_GATE_STORE_BACKEND") {
            match backend.to_lowercase().as_str() {
                "redis" => self.store.backend = StoreBackend::Redis,
                "memory" => self.store.backend = StoreBackend::Memory,
                _ => tracing::warn!("Ignoring unknown store backend override: {}", backend),
            }
        }
        if let Ok(url) = std::env::var("NOTIFICATION_GATE_REDIS_URL") {
            self.store.redis_url = url;
        }

        if let Ok(path) = std::env::var("NOTIFICATION_GATE_QUOTA_FILE") {
            self.quota_file = Some(path);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, including any
    /// invalid quota.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        self.listen_addr()?;

        if self.server.store_timeout_ms == 0 {
            anyhow::bail!("Store timeout must be > 0 ms");
        }

        if self.store.backend == StoreBackend::Redis && self.store.redis_url.trim().is_empty() {
            anyhow::bail!("Redis store selected but no redis_url configured");
        }
        if self.store.key_prefix.is_empty() {
            anyhow::bail!("Counter key prefix must not be empty");
        }

        self.quota_table()?;

        Ok(())
    }

    /// Build the validated quota table
    pub fn quota_table(&self) -> Result<QuotaTable> {
        if let Some(path) = &self.quota_file {
            return QuotaTable::load_json_file(path)
                .with_context(|| format!("Invalid quota file {}", path));
        }
        if self.quotas.is_empty() {
            return Ok(QuotaTable::embedded_default());
        }
        QuotaTable::from_entries(self.quotas.iter().map(|(name, raw)| (name.clone(), *raw)))
            .context("Invalid [quotas] configuration")
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.server.listen_addr))
    }

    /// Counter store timeout
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.server.store_timeout_ms)
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{Category, QuotaProvider};
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Environment variables are process-wide; serialize the tests touching them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "NOTIFICATION_GATE_LOG_LEVEL",
        "NOTIFICATION_GATE_LOG_FORMAT",
        "NOTIFICATION_GATE_LISTEN_ADDR",
        "NOTIFICATION_GATE_STORE_TIMEOUT_MS",
        "NOTIFICATION_GATE_STORE_BACKEND",
        "NOTIFICATION_GATE_REDIS_URL",
        "NOTIFICATION_GATE_QUOTA_FILE",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.server.store_timeout_ms, 2000);
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.key_prefix, "rate_limit:");
        assert!(config.quotas.is_empty());
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_listen_addr() {
        let mut config = Config::default();
        config.server.listen_addr = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.server.store_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_redis_url() {
        let mut config = Config::default();
        config.store.redis_url = String::new();
        assert!(config.validate().is_err());

        config.store.backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_quota() {
        let mut config = Config::default();
        config.quotas.insert(
            "news-notification".to_string(),
            RawQuota {
                limit: 0,
                window_secs: 60,
            },
        );
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("news-notification"));
    }

    #[test]
    fn test_quota_table_defaults_to_embedded() {
        let table = Config::default().quota_table().unwrap();
        assert_eq!(table, QuotaTable::embedded_default());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[server]
listen_addr = "0.0.0.0:9000"
store_timeout_ms = 500

[store]
backend = "memory"
key_prefix = "gate:"

[quotas.news-notification]
limit = 1
window_secs = 86400

[quotas.digest-notification]
limit = 4
window_secs = 600
"#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.listen_addr().unwrap().port(), 9000);
        assert_eq!(config.store_timeout(), Duration::from_millis(500));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.key_prefix, "gate:");

        let table = config.quota_table().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table
                .quota(&Category::new("digest-notification"))
                .unwrap()
                .limit(),
            4
        );
        assert!(table.quota(&Category::status()).is_none());
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging\nlevel = \"debug\"\n").unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_quota() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[quotas.status-notification]
limit = 2
window_secs = 0
"#;
        fs::write(temp_file.path(), toml_content).unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_quota_file_overrides_sections() {
        let quota_file = NamedTempFile::new().unwrap();
        fs::write(
            quota_file.path(),
            r#"{"status-notification": {"limit": 9, "window_size": 30}}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.quotas.insert(
            "news-notification".to_string(),
            RawQuota {
                limit: 1,
                window_secs: 60,
            },
        );
        config.quota_file = Some(quota_file.path().display().to_string());

        let table = config.quota_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.quota(&Category::status()).unwrap().limit(), 9);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var("NOTIFICATION_GATE_LOG_LEVEL", "debug");
        std::env::set_var("NOTIFICATION_GATE_LOG_FORMAT", "json");
        std::env::set_var("NOTIFICATION_GATE_LISTEN_ADDR", "0.0.0.0:7000");
        std::env::set_var("NOTIFICATION_GATE_STORE_TIMEOUT_MS", "250");
        std::env::set_var("NOTIFICATION_GATE_STORE_BACKEND", "memory");
        std::env::set_var("NOTIFICATION_GATE_REDIS_URL", "redis://cache:6379/");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.listen_addr, "0.0.0.0:7000");
        assert_eq!(config.server.store_timeout_ms, 250);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.redis_url, "redis://cache:6379/");

        clear_env();
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var("NOTIFICATION_GATE_STORE_TIMEOUT_MS", "0");
        std::env::set_var("NOTIFICATION_GATE_STORE_BACKEND", "etcd");

        let config = Config::default().apply_env_overrides();
        assert_eq!(config.server.store_timeout_ms, 2000);
        assert_eq!(config.store.backend, StoreBackend::Redis);

        clear_env();
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }
}
