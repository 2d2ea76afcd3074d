//! Configuration management for docquery
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.docquery/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{QueryError, Result};
use crate::query::{ClientOptions, DEFAULT_EVENT_BUFFER};
use crate::streaming::{DEFAULT_API_URL, DEFAULT_QUERY_PATH, MAX_BUFFER_SIZE};

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "DOCQUERY_API_URL";

/// Complete configuration for docquery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub client: ClientConfig,
    pub display: DisplayConfig,
}

/// Backend endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub query_path: String,
}

/// Query client behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound for a buffered request, 0 disables
    pub request_timeout_secs: u64,
    /// Inactivity limit for answers and stream events, 0 disables
    pub idle_timeout_secs: u64,
    pub event_buffer: usize,
    pub max_frame_bytes: usize,
}

/// Terminal output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub default_verbosity: String,
    pub color_output: bool,
    pub show_spinner: bool,
    pub history_file: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            query_path: DEFAULT_QUERY_PATH.to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            idle_timeout_secs: 0,
            event_buffer: DEFAULT_EVENT_BUFFER,
            max_frame_bytes: MAX_BUFFER_SIZE,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_verbosity: "normal".to_string(),
            color_output: true,
            show_spinner: true,
            history_file: "~/.docquery/history".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| QueryError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| QueryError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".docquery").join("config.toml"))
    }

    /// Apply environment and command-line overrides, in that order
    pub fn apply_overrides(&mut self, env_url: Option<String>, cli_url: Option<&str>) -> Result<()> {
        if let Some(url) = env_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(url) = cli_url {
            self.api.base_url = url.to_string();
        }
        self.validate()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(QueryError::ConfigError("base_url must not be empty".to_string()));
        }

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(QueryError::ConfigError(format!(
                "base_url must use http or https: {}",
                base_url
            )));
        }

        if !self.api.query_path.starts_with('/') {
            return Err(QueryError::ConfigError(
                "query_path must start with '/'".to_string(),
            ));
        }

        if self.client.event_buffer == 0 {
            return Err(QueryError::ConfigError(
                "event_buffer must be greater than 0".to_string(),
            ));
        }

        if self.client.max_frame_bytes == 0 {
            return Err(QueryError::ConfigError(
                "max_frame_bytes must be greater than 0".to_string(),
            ));
        }

        match self.display.default_verbosity.as_str() {
            "quiet" | "normal" | "verbose" | "very_verbose" => {}
            _ => {
                return Err(QueryError::ConfigError(format!(
                    "Invalid verbosity level: {}",
                    self.display.default_verbosity
                )))
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| QueryError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                QueryError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| QueryError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Buffered request timeout, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        secs(self.client.request_timeout_secs)
    }

    /// Idle timeout, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        secs(self.client.idle_timeout_secs)
    }

    /// Query client options derived from this configuration
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            idle_timeout: self.idle_timeout(),
        }
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Prompt history file path
    pub fn history_path(&self) -> PathBuf {
        Self::expand_path(&self.display.history_file)
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}
