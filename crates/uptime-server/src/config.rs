//! Configuration loading and validation for the uptime server

use crate::types::ServerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uptime::CheckerSettings;
use validator::{Validate, ValidationError};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "UPTIME_CONFIG";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub checkers: CheckersSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.server.validate()?;
        self.database.validate()?;
        self.scheduler.validate()?;
        self.checkers.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,
}

/// Store settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseSettings {
    #[validate(custom = "validate_database_url")]
    pub url: String,

    #[validate(range(min = 1, max = 64))]
    pub max_connections: u32,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_busy_timeout")]
    pub busy_timeout: Duration,
}

/// Sweep scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SchedulerSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_sweep_interval")]
    pub interval: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_snapshot_timeout")]
    pub snapshot_timeout: Duration,

    pub sweep_on_start: bool,

    #[validate(range(min = 1, max = 10000))]
    pub report_channel: usize,
}

/// Probe settings per protocol
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CheckersSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub http_timeout: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub tcp_timeout: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub ping_timeout: Duration,

    #[validate(length(min = 1))]
    pub ping_command: String,
}

/// Prometheus endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: LogFormat,
}

impl LoggingSettings {
    pub fn level_or_default(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }
}

/// OpenTelemetry export settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,

    #[validate(length(min = 1))]
    pub service_name: String,

    #[validate(length(min = 1))]
    pub otlp_endpoint: String,
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://uptime.db".to_string(),
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            snapshot_timeout: Duration::from_secs(10),
            sweep_on_start: false,
            report_channel: 64,
        }
    }
}

impl Default for CheckersSettings {
    fn default() -> Self {
        let defaults = CheckerSettings::default();
        Self {
            http_timeout: defaults.http_timeout,
            tcp_timeout: defaults.tcp_timeout,
            ping_timeout: defaults.ping_timeout,
            ping_command: defaults.ping_command,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "uptime-server".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

// Custom validators

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.trim()
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

fn validate_database_url(url: &str) -> Result<(), ValidationError> {
    let trimmed = url.trim();
    if !trimmed.starts_with("sqlite:") || trimmed.len() <= "sqlite:".len() {
        return Err(ValidationError::new("database_url_not_sqlite"));
    }
    Ok(())
}

fn validate_busy_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if *timeout > Duration::from_secs(60) {
        return Err(ValidationError::new("busy_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_sweep_interval(interval: &Duration) -> Result<(), ValidationError> {
    if *interval < Duration::from_secs(1) || *interval > Duration::from_secs(3600) {
        return Err(ValidationError::new("sweep_interval_out_of_range"));
    }
    Ok(())
}

fn validate_snapshot_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if *timeout < Duration::from_millis(100) || *timeout > Duration::from_secs(300) {
        return Err(ValidationError::new("snapshot_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_probe_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if *timeout < Duration::from_millis(10) || *timeout > Duration::from_secs(300) {
        return Err(ValidationError::new("probe_timeout_out_of_range"));
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from `UPTIME_CONFIG` or the default search paths
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path));
            }
            tracing::info!("Loading configuration from {}: {}", CONFIG_ENV, path.display());
            return Self::load_from_file(&path);
        }

        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/uptime/uptime-server.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./uptime-server.yaml"));

        paths.into_iter().find(|p| p.is_file())
    }

    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/uptime/uptime-server.yaml"))
    }

    /// Flatten into the runtime [`ServerConfig`]
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.server.listen_addr.trim().to_string(),
            database_url: self.database.url.trim().to_string(),
            database_max_connections: self.database.max_connections,
            database_busy_timeout: self.database.busy_timeout,
            sweep_interval: self.scheduler.interval,
            snapshot_timeout: self.scheduler.snapshot_timeout,
            sweep_on_start: self.scheduler.sweep_on_start,
            report_channel_size: self.scheduler.report_channel,
            checkers: CheckerSettings {
                http_timeout: self.checkers.http_timeout,
                tcp_timeout: self.checkers.tcp_timeout,
                ping_timeout: self.checkers.ping_timeout,
                ping_command: self.checkers.ping_command.clone(),
            },
            metrics_enabled: self.metrics.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_yaml_parsing() {
        let yaml = r#"
server:
  listen_addr: "127.0.0.1:9090"

database:
  url: "sqlite:///var/lib/uptime/uptime.db"
  max_connections: 4
  busy_timeout: 2s

scheduler:
  interval: 30s
  snapshot_timeout: 5s
  sweep_on_start: true
  report_channel: 16

checkers:
  http_timeout: 3s
  tcp_timeout: 1500ms
  ping_timeout: 1s
  ping_command: /bin/ping

metrics:
  enabled: false

logging:
  level: debug
  format: json
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.scheduler.interval, Duration::from_secs(30));
        assert!(config.scheduler.sweep_on_start);
        assert_eq!(config.checkers.tcp_timeout, Duration::from_millis(1500));
        assert!(!config.metrics.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level_or_default(), "debug");
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
scheduler:
  interval: 5m
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.scheduler.interval, Duration::from_secs(300));
        assert_eq!(config.scheduler.snapshot_timeout, Duration::from_secs(10));
        assert_eq!(config.database.url, "sqlite://uptime.db");
        assert_eq!(config.checkers.http_timeout, Duration::from_secs(10));
        assert_eq!(config.checkers.tcp_timeout, Duration::from_secs(5));
        assert!(config.metrics.enabled);
        assert_eq!(config.logging.format, LogFormat::Plain);
        assert_eq!(config.logging.level_or_default(), "info");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_sweep_interval() {
        let too_short = r#"
scheduler:
  interval: 500ms
"#;
        assert!(matches!(
            Config::from_yaml(too_short),
            Err(ConfigError::ValidationError(_))
        ));

        let too_long = r#"
scheduler:
  interval: 2h
"#;
        assert!(Config::from_yaml(too_long).is_err());
    }

    #[test]
    fn test_invalid_max_connections() {
        let yaml = r#"
database:
  max_connections: 0
"#;
        assert!(Config::from_yaml(yaml).is_err());

        let yaml = r#"
database:
  max_connections: 500
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_listen_addr_validation() {
        assert!(validate_listen_addr("127.0.0.1:8080").is_ok());
        assert!(validate_listen_addr("[::1]:80").is_ok());
        assert!(validate_listen_addr("localhost").is_err());
        assert!(validate_listen_addr("").is_err());
    }

    #[test]
    fn test_database_url_validation() {
        assert!(validate_database_url("sqlite://uptime.db").is_ok());
        assert!(validate_database_url("sqlite::memory:").is_ok());
        assert!(validate_database_url("postgres://db/uptime").is_err());
        assert!(validate_database_url("sqlite:").is_err());
    }

    #[test]
    fn test_unknown_log_format_is_a_parse_error() {
        let yaml = r#"
logging:
  format: xml
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_config_to_server_config_conversion() {
        let server_config = Config::default().to_server_config();

        assert_eq!(server_config.listen_addr, "0.0.0.0:8080");
        assert_eq!(server_config.database_max_connections, 8);
        assert_eq!(server_config.sweep_interval, Duration::from_secs(60));
        assert_eq!(server_config.report_channel_size, 64);
        assert_eq!(server_config.checkers.ping_command, "ping");
        assert!(server_config.metrics_enabled);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uptime-server.yaml");
        std::fs::write(&path, "checkers:\n  ping_timeout: 3s\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.checkers.ping_timeout, Duration::from_secs(3));

        let missing = Config::load_from_file(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::IoError(_))));
    }
}
