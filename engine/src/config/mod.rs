//! Configuration management
//!
//! This module handles loading, validation, and management of the Parley configuration.
//! Configuration is stored in TOML format at ~/.parley/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **nlu**: NLU service endpoint, API version and HTTP settings
//! - **engine**: Conversation loop bounds and channel sizes
//! - **feed**: Direct-message connector endpoint and polling cadence
//!
//! Every section and field has a default, so a partial file is valid.
//! Secrets never live here: the NLU token comes from the command line or the
//! credentials file (see `credentials`).
//!
//! # Examples
//!
//! ```no_run
//! use parley_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from default location
//! let config = Config::load_or_create()?;
//!
//! println!("NLU endpoint: {}", config.nlu.base_url);
//! println!("Max turns: {}", config.engine.max_turns);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod credentials;

pub use credentials::Credentials;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// NLU service settings
    #[serde(default)]
    pub nlu: NluConfig,

    /// Conversation engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Feed connector settings
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// NLU service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluConfig {
    /// Base URL for the NLU API
    #[serde(default = "default_nlu_base_url")]
    pub base_url: String,

    /// API version pinned on every request
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Conversation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum NLU calls per query (0 disables the cap)
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Capacity of the acknowledgement channel handed to input sources
    #[serde(default = "default_ack_buffer")]
    pub ack_buffer: usize,
}

/// Feed connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL for the direct message API
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,

    /// Seconds between fetch cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Minimum seconds to wait after a rate-limit response
    #[serde(default = "default_min_wait_secs")]
    pub min_wait_secs: u64,

    /// Messages requested per fetch (the API allows at most 200)
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Capacity of the outgoing reply queue
    #[serde(default = "default_outgoing_buffer")]
    pub outgoing_buffer: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nlu_base_url() -> String {
    "https://api.wit.ai".to_string()
}

fn default_api_version() -> String {
    "20160412".to_string()
}

fn default_user_agent() -> String {
    format!("parley/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_turns() -> usize {
    25
}

fn default_ack_buffer() -> usize {
    16
}

fn default_feed_base_url() -> String {
    "https://api.twitter.com".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_min_wait_secs() -> u64 {
    10
}

fn default_fetch_limit() -> usize {
    100
}

fn default_outgoing_buffer() -> usize {
    10
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            base_url: default_nlu_base_url(),
            api_version: default_api_version(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            ack_buffer: default_ack_buffer(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            min_wait_secs: default_min_wait_secs(),
            fetch_limit: default_fetch_limit(),
            outgoing_buffer: default_outgoing_buffer(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create it if missing
    ///
    /// The default location is ~/.parley/config.toml. If the file doesn't
    /// exist, a default configuration is written there.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The home directory cannot be determined
    /// - The config file cannot be read or parsed
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;
        Self::load_or_create_at(&config_path)
    }

    /// Same as `load_or_create` for an explicit path (supports ~ expansion)
    pub fn load_or_create_at(path: &Path) -> Result<Self, EngineError> {
        let config_path = expand_path(path)?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Write a default configuration to `path`, creating parent directories
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Wrote default configuration to {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path (~/.parley/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".parley").join("config.toml"))
    }

    /// Validate and normalise configuration values
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        self.core.log_level = self.core.log_level.to_lowercase();
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        validate_base_url("nlu.base_url", &self.nlu.base_url)?;
        validate_base_url("feed.base_url", &self.feed.base_url)?;
        self.nlu.base_url = self.nlu.base_url.trim_end_matches('/').to_string();
        self.feed.base_url = self.feed.base_url.trim_end_matches('/').to_string();

        if self.nlu.api_version.trim().is_empty() {
            return Err(EngineError::Config(
                "nlu.api_version must not be empty".to_string(),
            ));
        }

        require_positive("nlu.timeout_secs", self.nlu.timeout_secs)?;
        require_positive("feed.timeout_secs", self.feed.timeout_secs)?;
        require_positive("feed.poll_interval_secs", self.feed.poll_interval_secs)?;
        require_positive("engine.ack_buffer", self.engine.ack_buffer as u64)?;
        require_positive("feed.outgoing_buffer", self.feed.outgoing_buffer as u64)?;

        if self.feed.fetch_limit == 0 || self.feed.fetch_limit > 200 {
            return Err(EngineError::Config(
                "feed.fetch_limit must be between 1 and 200".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_base_url(field: &str, url: &str) -> Result<(), EngineError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{} must be an http(s) URL, got '{}'",
            field, url
        )))
    }
}

fn require_positive(field: &str, value: u64) -> Result<(), EngineError> {
    if value == 0 {
        return Err(EngineError::Config(format!(
            "{} must be greater than 0",
            field
        )));
    }
    Ok(())
}

/// Expand a leading ~ to the user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
