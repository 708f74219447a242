//! Configuration types and loading logic.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml, Yaml};
use figment::Figment;
use mirror_tracing::TracingConfig;
use serde::Deserialize;
use thiserror::Error;

/// Top-level proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Destination base URLs. Index 0 is the primary.
    pub forward_urls: Vec<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// JSON log file; overrides `tracing.log_file`.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Log filter directive; overrides `tracing.log_level`.
    #[serde(default)]
    pub logging_level: Option<String>,

    /// Per-dispatch timeout, connect through body read.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Largest inbound body accepted for mirroring.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default)]
    pub tracing: TracingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("forward_urls[{index}] is not a valid URL ({url}): {source}")]
    InvalidUrl {
        index: usize,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("forward_urls[{index}] must be an http or https URL: {url}")]
    UnsupportedScheme { index: usize, url: String },
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8190
}

fn default_timeout() -> u64 {
    5
}

fn default_max_redirects() -> usize {
    10
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl ProxyConfig {
    /// Load configuration from a YAML or TOML file and environment variables.
    ///
    /// `.yml`/`.yaml` files are read as YAML, anything else as TOML.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (MIRROR_ prefix, __ for nesting)
    /// 2. Config file
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let figment = if is_yaml(Path::new(config_path)) {
            Figment::new().merge(Yaml::file(config_path))
        } else {
            Figment::new().merge(Toml::file(config_path))
        };

        Self::from_figment(figment.merge(Env::prefixed("MIRROR_").split("__")))
    }

    /// Extract and validate.
    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: ProxyConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Every destination must be an absolute http(s) URL. An empty list is
    /// allowed; each request then gets the no-primary 502.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, raw) in self.forward_urls.iter().enumerate() {
            let parsed = url::Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
                index,
                url: raw.clone(),
                source,
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::UnsupportedScheme {
                    index,
                    url: raw.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Tracing settings with the top-level logging keys applied.
    pub fn tracing_config(&self) -> TracingConfig {
        let mut tracing = self.tracing.clone();
        if let Some(level) = &self.logging_level {
            tracing.log_level = level.clone();
        }
        if let Some(file) = &self.log_file {
            tracing.log_file = Some(file.clone());
        }
        tracing
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml" | "yaml")
    )
}
