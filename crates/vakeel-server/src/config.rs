//! YAML configuration for the server.
//!
//! All keys are optional; a missing file yields the defaults below and
//! unknown keys are ignored.
//!
//! ```yaml
//! log:
//!   level: info          # debug | info | warn | error | fatal
//! grpc:
//!   network: tcp
//!   host: 0.0.0.0
//!   port: 4643
//! webhooks:
//!   - id: 11111111-1111-1111-1111-111111111111
//!     target: https://example.com/hook
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown log level: {0}")]
    UnknownLogLevel(String),

    #[error("unsupported grpc network: {0}")]
    UnsupportedNetwork(String),
}

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub grpc: GrpcConfig,
    pub webhooks: Vec<WebhookConfig>,
}

/// Logger configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum severity: debug, info, warn, error or fatal.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Maps the configured level onto a tracing filter directive.
    ///
    /// `fatal` collapses onto `error`; tracing has no fatal severity.
    pub fn directive(&self) -> Result<&'static str, ConfigError> {
        match self.level.as_str() {
            "debug" => Ok("debug"),
            "info" => Ok("info"),
            "warn" => Ok("warn"),
            "error" | "fatal" => Ok("error"),
            other => Err(ConfigError::UnknownLogLevel(other.to_string())),
        }
    }
}

/// gRPC listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrpcConfig {
    /// Transport protocol. Only `tcp` is supported.
    pub network: String,
    pub host: String,
    pub port: u16,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            network: "tcp".to_string(),
            host: "0.0.0.0".to_string(),
            port: 4643,
        }
    }
}

impl GrpcConfig {
    /// The bind address in `host:port` form.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One webhook registration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Service identifier the webhook is keyed by.
    pub id: Uuid,
    /// URL notified on every state transition of the service.
    pub target: String,
}

impl Config {
    /// Loads configuration from a YAML file.
    ///
    /// An absent file is not an error; the defaults apply and no webhooks
    /// are configured.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&raw)?;
        Ok(config)
    }

    /// Webhook registrations as a lookup map for the directory.
    pub fn webhook_map(&self) -> HashMap<Uuid, String> {
        self.webhooks
            .iter()
            .map(|hook| (hook.id, hook.target.clone()))
            .collect()
    }
}
