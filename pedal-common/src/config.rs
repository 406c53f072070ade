//! Configuration loading
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`PEDAL_ID_*`)
//! 3. TOML config file (`<config_dir>/pedal-id/config.toml`)
//! 4. Compiled default (fallback)
//!
//! A missing config file is normal. An unreadable or invalid one is logged
//! and ignored so the service still starts on defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::data_uri::DEFAULT_MAX_IMAGE_BYTES;
use crate::{Error, Result};

/// Application directory name under the platform config dir
pub const APP_DIR: &str = "pedal-id";

/// Compiled defaults
pub mod defaults {
    pub const BIND_ADDRESS: &str = "127.0.0.1";
    pub const PORT: u16 = 5740;
    /// Google's OpenAI-compatible Gemini endpoint
    pub const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
    pub const MODEL: &str = "gemini-2.0-flash";
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
    pub const LOG_LEVEL: &str = "info";
}

/// Environment variable names
pub mod env_vars {
    pub const BIND_ADDRESS: &str = "PEDAL_ID_BIND";
    pub const PORT: &str = "PEDAL_ID_PORT";
    pub const API_BASE_URL: &str = "PEDAL_ID_API_BASE_URL";
    pub const MODEL: &str = "PEDAL_ID_MODEL";
    pub const API_KEY: &str = "PEDAL_ID_API_KEY";
    /// Accepted as a fallback for the API key
    pub const GOOGLE_API_KEY: &str = "GOOGLE_GENAI_API_KEY";
    pub const REQUEST_TIMEOUT_SECS: &str = "PEDAL_ID_TIMEOUT_SECS";
    pub const MAX_IMAGE_BYTES: &str = "PEDAL_ID_MAX_IMAGE_BYTES";
    pub const LOG_LEVEL: &str = "PEDAL_ID_LOG";
}

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

/// On-disk TOML configuration; every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub api_base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_image_bytes: Option<usize>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load from a file; a missing file yields `Ok(None)`
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        Self::parse(&content).map(Some)
    }

    /// Load, logging and discarding any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(Some(config)) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Ok(None) => {
                info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Default config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub api_base_url: Option<String>,
    pub model: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Settings for the hosted vision model
#[derive(Debug, Clone, PartialEq)]
pub struct VisionSettings {
    pub api_base_url: String,
    pub model: String,
    /// May be absent at startup; identification then fails with an auth error
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    pub vision: VisionSettings,
    pub max_image_bytes: usize,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::BIND_ADDRESS.to_string(),
            port: defaults::PORT,
            vision: VisionSettings {
                api_base_url: defaults::API_BASE_URL.to_string(),
                model: defaults::MODEL.to_string(),
                api_key: None,
                request_timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
            },
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Resolve from CLI overrides, process environment, and the config file
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let toml = overrides
            .config_path
            .clone()
            .or_else(default_config_path)
            .map(|path| TomlConfig::load_or_default(&path))
            .unwrap_or_default();

        Self::resolve_with(overrides, &toml, |name| std::env::var(name).ok())
    }

    /// Resolve from explicit sources; `lookup` reads environment variables
    pub fn resolve_with<F>(overrides: &ConfigOverrides, toml: &TomlConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_address = overrides
            .bind_address
            .clone()
            .or_else(|| env(env_vars::BIND_ADDRESS))
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| defaults::BIND_ADDRESS.to_string());

        let port = match overrides.port {
            Some(port) => port,
            None => match env(env_vars::PORT) {
                Some(raw) => parse_env(env_vars::PORT, &raw)?,
                None => toml.port.unwrap_or(defaults::PORT),
            },
        };

        let api_base_url = overrides
            .api_base_url
            .clone()
            .or_else(|| env(env_vars::API_BASE_URL))
            .or_else(|| toml.api_base_url.clone())
            .unwrap_or_else(|| defaults::API_BASE_URL.to_string());

        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API base URL must be http(s): {}",
                api_base_url
            )));
        }

        let model = overrides
            .model
            .clone()
            .or_else(|| env(env_vars::MODEL))
            .or_else(|| toml.model.clone())
            .unwrap_or_else(|| defaults::MODEL.to_string());

        let api_key = env(env_vars::API_KEY)
            .or_else(|| env(env_vars::GOOGLE_API_KEY))
            .or_else(|| toml.api_key.clone())
            .filter(|key| is_valid_key(key));

        let timeout_secs = match env(env_vars::REQUEST_TIMEOUT_SECS) {
            Some(raw) => parse_env(env_vars::REQUEST_TIMEOUT_SECS, &raw)?,
            None => toml
                .request_timeout_secs
                .unwrap_or(defaults::REQUEST_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(Error::Config("request timeout must be at least 1 second".to_string()));
        }

        let max_image_bytes = match env(env_vars::MAX_IMAGE_BYTES) {
            Some(raw) => parse_env(env_vars::MAX_IMAGE_BYTES, &raw)?,
            None => toml.max_image_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
        };

        let log_level = env(env_vars::LOG_LEVEL)
            .or_else(|| toml.logging.level.clone())
            .unwrap_or_else(|| defaults::LOG_LEVEL.to_string());

        let config = Self {
            bind_address,
            port,
            vision: VisionSettings {
                api_base_url: api_base_url.trim_end_matches('/').to_string(),
                model,
                api_key,
                request_timeout: Duration::from_secs(timeout_secs),
            },
            max_image_bytes,
            log_level,
        };

        if config.vision.api_key.is_none() {
            warn!(
                "No vision API key configured. Set {} (or {}) or api_key in the config file; \
                 identification requests will fail until one is provided.",
                env_vars::API_KEY,
                env_vars::GOOGLE_API_KEY
            );
        }

        Ok(config)
    }

    /// `host:port` string for binding the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// API key sanity check (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: '{}'", name, raw)))
}
