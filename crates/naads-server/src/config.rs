//! Configuration loading and validation for the NAADS server

use crate::types::{DEFAULT_FEED_HOSTS, OutputFormat, ServerConfig};
use naads::{ControllerConfig, FeedConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found in search paths")]
    FileNotFound,

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSettings>,

    #[serde(default)]
    pub controller: ControllerSettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        if self.feeds.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add("feeds", ValidationError::new("feeds_empty"));
            return Err(errors);
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            feed.validate()?;
            if !names.insert(feed.name.as_str()) {
                let mut errors = ValidationErrors::new();
                errors.add("feeds", ValidationError::new("feed_name_duplicate"));
                return Err(errors);
            }
        }

        self.controller.validate()?;
        self.http.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

/// One upstream feed
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedSettings {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub host: String,

    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    #[serde(default)]
    pub forward_heartbeats: bool,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    #[validate(custom = "validate_timeout")]
    pub connect_timeout: Duration,

    #[serde(default = "default_liveness_timeout", with = "humantime_serde")]
    #[validate(custom = "validate_timeout")]
    pub liveness_timeout: Duration,

    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    #[validate(custom = "validate_timeout")]
    pub reconnect_delay: Duration,

    #[serde(default = "default_true")]
    pub logging: bool,

    #[serde(default)]
    pub log_heartbeats: bool,
}

/// Failover controller settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ControllerSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_check_interval")]
    pub check_interval: Duration,

    #[validate(range(min = 16, max = 100000))]
    pub channel_capacity: usize,

    pub logging: bool,
}

/// Status dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HttpSettings {
    pub enabled: bool,

    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,
}

/// Metrics settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetricsSettings {
    pub enabled: bool,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_refresh_interval")]
    pub refresh_interval: Duration,
}

/// Alert output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

/// OpenTelemetry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub service_name: String,
    pub otlp_endpoint: String,
    /// "grpc" or "http"
    pub protocol: String,
}

// Default implementations

fn default_port() -> u16 {
    naads::types::DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    FeedConfig::default().connect_timeout
}

fn default_liveness_timeout() -> Duration {
    FeedConfig::default().liveness_timeout
}

fn default_reconnect_delay() -> Duration {
    FeedConfig::default().reconnect_delay
}

fn default_true() -> bool {
    true
}

fn default_feeds() -> Vec<FeedSettings> {
    DEFAULT_FEED_HOSTS
        .iter()
        .map(|(name, host)| FeedSettings::from(&FeedConfig::new(*name, *host)))
        .collect()
}

impl From<&FeedConfig> for FeedSettings {
    fn from(config: &FeedConfig) -> Self {
        Self {
            name: config.name.clone(),
            host: config.host.clone(),
            port: config.port,
            forward_heartbeats: config.forward_heartbeats,
            connect_timeout: config.connect_timeout,
            liveness_timeout: config.liveness_timeout,
            reconnect_delay: config.reconnect_delay,
            logging: config.logging,
            log_heartbeats: config.log_heartbeats,
        }
    }
}

impl FeedSettings {
    /// Convert to the core crate's FeedConfig
    pub fn to_feed_config(&self) -> FeedConfig {
        FeedConfig {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            forward_heartbeats: self.forward_heartbeats,
            connect_timeout: self.connect_timeout,
            liveness_timeout: self.liveness_timeout,
            reconnect_delay: self.reconnect_delay,
            logging: self.logging,
            log_heartbeats: self.log_heartbeats,
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        let defaults = ControllerConfig::default();
        Self {
            check_interval: defaults.check_interval,
            channel_capacity: defaults.channel_capacity,
            logging: defaults.logging,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval: Duration::from_secs(1),
        }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "naads-server".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            protocol: "grpc".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            controller: ControllerSettings::default(),
            http: HttpSettings::default(),
            metrics: MetricsSettings::default(),
            output: OutputSettings::default(),
            logging: LoggingSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

// Custom validators

fn validate_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if timeout.is_zero() {
        return Err(ValidationError::new("timeout_zero"));
    }
    if timeout.as_secs() > 3600 {
        return Err(ValidationError::new("timeout_out_of_range"));
    }
    Ok(())
}

fn validate_check_interval(interval: &Duration) -> Result<(), ValidationError> {
    let millis = interval.as_millis();
    if !(10..=60_000).contains(&millis) {
        return Err(ValidationError::new("check_interval_out_of_range"));
    }
    Ok(())
}

fn validate_refresh_interval(interval: &Duration) -> Result<(), ValidationError> {
    let millis = interval.as_millis();
    if !(100..=60_000).contains(&millis) {
        return Err(ValidationError::new("refresh_interval_out_of_range"));
    }
    Ok(())
}

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.trim()
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
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
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/naads/naads-server.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./naads-server.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/naads/naads-server.yaml"))
    }

    /// Log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or("info")
    }

    /// Whether logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.logging
            .format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }

    /// Convert to ServerConfig
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            feeds: self.feeds.iter().map(FeedSettings::to_feed_config).collect(),
            controller: ControllerConfig {
                check_interval: self.controller.check_interval,
                channel_capacity: self.controller.channel_capacity,
                logging: self.controller.logging,
            },
            status_listen_addr: self.http.enabled.then(|| self.http.listen_addr.clone()),
            metrics_enabled: self.metrics.enabled,
            metrics_refresh_interval: self.metrics.refresh_interval,
            output: self.output.format,
        }
    }
}
