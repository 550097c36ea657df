//! Service configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then
//! environment variables. Command-line flags are applied last by the binaries.

use crate::authz::{Authorizer, PolicyClient, DEFAULT_DECISION_PATH};
use crate::error::{CarInfoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Full service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP listener and storage
    pub server: ServerConfig,
    /// Policy decision point
    pub policy: PolicyConfig,
    /// Logging and telemetry
    pub logging: LoggingConfig,
}

/// Listener and storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:8123`
    pub bind_address: String,
    /// Snapshot file
    pub data_file: PathBuf,
    /// Keep the snapshot in memory instead of on disk
    pub ephemeral: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1:8123".to_string(),
            data_file: PathBuf::from("./data.json"),
            ephemeral: false,
        }
    }
}

/// How authorization decisions are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyMode {
    /// No policy endpoint; allow everything
    Open,
    /// Query the policy endpoint over HTTP
    Http,
    /// Allow everything (testing)
    AllowAll,
    /// Deny everything (testing)
    DenyAll,
}

impl FromStr for PolicyMode {
    type Err = CarInfoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PolicyMode::Open),
            "http" => Ok(PolicyMode::Http),
            "allow-all" => Ok(PolicyMode::AllowAll),
            "deny-all" => Ok(PolicyMode::DenyAll),
            other => Err(CarInfoError::ConfigError(format!(
                "unknown policy mode '{}' (expected open, http, allow-all or deny-all)",
                other
            ))),
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyMode::Open => "open",
            PolicyMode::Http => "http",
            PolicyMode::AllowAll => "allow-all",
            PolicyMode::DenyAll => "deny-all",
        };
        f.write_str(name)
    }
}

/// Policy decision point settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Explicit mode. When unset, `http` if a URL is configured, otherwise `open`.
    pub mode: Option<PolicyMode>,
    /// Policy endpoint URL
    pub url: Option<String>,
    /// Slash-separated location of the boolean decision in the response
    pub decision_path: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            mode: None,
            url: None,
            decision_path: DEFAULT_DECISION_PATH.to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl PolicyConfig {
    /// Mode after applying the URL-implies-http default
    pub fn effective_mode(&self) -> PolicyMode {
        match (self.mode, &self.url) {
            (Some(mode), _) => mode,
            (None, Some(_)) => PolicyMode::Http,
            (None, None) => PolicyMode::Open,
        }
    }

    /// Construct the authorizer this configuration describes
    pub fn build_authorizer(&self) -> Result<Authorizer> {
        match self.effective_mode() {
            PolicyMode::Open => Ok(Authorizer::Open),
            PolicyMode::AllowAll => Ok(Authorizer::Fixed(true)),
            PolicyMode::DenyAll => Ok(Authorizer::Fixed(false)),
            PolicyMode::Http => {
                let url = self.url.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| {
                    CarInfoError::ConfigError("policy mode 'http' requires a policy URL".to_string())
                })?;
                let client = PolicyClient::new(
                    url,
                    &self.decision_path,
                    Duration::from_millis(self.timeout_ms),
                )?;
                Ok(Authorizer::Remote(client))
            }
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = CarInfoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(CarInfoError::ConfigError(format!(
                "unknown log format '{}' (expected pretty or json)",
                other
            ))),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Export spans over OTLP
    pub otel_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            otel_enabled: false,
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| CarInfoError::ConfigError(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CarInfoError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Defaults or `path`, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("CARINFO_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Some(path) = lookup("CARINFO_DATA_FILE") {
            self.server.data_file = PathBuf::from(path);
        }
        if let Some(url) = lookup("CARINFO_OPA_URL") {
            self.policy.url = Some(url);
        }
        if let Some(mode) = lookup("CARINFO_POLICY_MODE") {
            self.policy.mode = Some(mode.parse()?);
        }
        if let Some(level) = lookup("CARINFO_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CARINFO_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Some(enabled) = lookup("OTEL_ENABLED") {
            self.logging.otel_enabled = enabled.parse().unwrap_or(false);
        }
        Ok(())
    }
}
