use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::worker::WorkerConfig;

pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for every route except `/health` and `/metrics`.
    pub base_path: String,
    #[serde(alias = "origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            base_path: "/api/v1".into(),
            allowed_origins: vec!["*".into()],
        }
    }
}

impl HttpConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: String,
    pub header: String,
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            header: default_api_key_header(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Redb,
            path: PathBuf::from("data/transactions.redb"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkerSettings {
    pub threads: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Zero disables the periodic repair recompute.
    pub repair_interval_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        let defaults = WorkerConfig::default();
        Self {
            threads: defaults.threads,
            max_attempts: defaults.max_attempts,
            retry_backoff_ms: defaults.retry_backoff.as_millis() as u64,
            repair_interval_secs: defaults
                .repair_interval
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

impl From<&WorkerSettings> for WorkerConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            threads: settings.threads,
            max_attempts: settings.max_attempts.max(1),
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
            repair_interval: (settings.repair_interval_secs > 0)
                .then(|| Duration::from_secs(settings.repair_interval_secs)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            // 1. Project defaults from config/default.{toml,json}
            .add_source(File::with_name("config/default").required(false))
            // 2. Local overrides from config/local.{toml,json} (not checked in)
            .add_source(File::with_name("config/local").required(false))
            // 3. Environment overrides, e.g. TXSTATS_AUTH__API_KEY
            .add_source(
                Environment::with_prefix("TXSTATS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.api_key must be set (TXSTATS_AUTH__API_KEY)".into(),
            ));
        }
        if self.auth.header.trim().is_empty() {
            return Err(ConfigError::Message("auth.header must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_config_defaults() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings.http.port, 8000);
        assert_eq!(settings.http.base_path, "/api/v1");
        assert_eq!(settings.auth.header, DEFAULT_API_KEY_HEADER);
        assert_eq!(settings.storage.backend, StorageBackend::Redb);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let settings = from_toml("").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_sections_parse() {
        let settings = from_toml(
            r#"
            [http]
            host = "127.0.0.1"
            port = 9100
            base_path = ""
            origins = ["http://localhost:3000"]

            [auth]
            api_key = "1234567890"

            [storage]
            backend = "memory"
            path = "/tmp/unused.redb"

            [worker]
            threads = 4
            max_attempts = 0
            retry_backoff_ms = 50
            repair_interval_secs = 0
            "#,
        )
        .unwrap();

        assert!(settings.validate().is_ok());
        assert_eq!(settings.http.bind_address(), "127.0.0.1:9100");
        assert_eq!(settings.http.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(settings.storage.backend, StorageBackend::Memory);

        let worker = WorkerConfig::from(&settings.worker);
        assert_eq!(worker.threads, 4);
        assert_eq!(worker.max_attempts, 1);
        assert_eq!(worker.retry_backoff, Duration::from_millis(50));
        assert_eq!(worker.repair_interval, None);
    }
}
