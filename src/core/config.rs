//! Mesh configuration.
//!
//! All sections have defaults, so an empty JSON object is a valid config.
//! `AGENT_MESH_*` environment variables override file values.

use crate::core::{Error, Result};
use crate::monitoring::logging::{LogFormat, LogLevel, LoggerConfig};
use crate::provider::InvocationOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "AGENT_MESH_";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub coordinator: CoordinatorConfig,
    pub blobs: BlobConfig,
    pub logging: LoggerConfig,
}

impl MeshConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file and apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_json_str(&raw)?;
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    /// Apply `AGENT_MESH_*` overrides from the given variables.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "MAX_NONCE_RETRIES" => {
                    self.coordinator.max_nonce_retries = parse_env(&key, &value)?
                }
                "BACKEND_TIMEOUT_MS" => {
                    self.coordinator.backend_timeout_ms = parse_env(&key, &value)?
                }
                "POLL_INTERVAL_MS" => self.coordinator.poll_interval_ms = parse_env(&key, &value)?,
                "AUTO_ACCEPT" => self.coordinator.auto_accept = parse_env(&key, &value)?,
                "BLOB_INLINE_THRESHOLD" => {
                    self.blobs.inline_threshold = parse_env(&key, &value)?
                }
                "LOG_FORMAT" => {
                    self.logging.format = match value.to_ascii_lowercase().as_str() {
                        "json" => LogFormat::Json,
                        "text" => LogFormat::Text,
                        other => {
                            return Err(Error::Config(format!("{key}: unknown format '{other}'")))
                        }
                    }
                }
                "LOG_LEVEL" => {
                    self.logging.level = value
                        .parse::<LogLevel>()
                        .map_err(|e| Error::Config(format!("{key}: {e}")))?
                }
                _ => {}
            }
        }
        self.validate()
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.max_nonce_retries == 0 {
            return Err(Error::Config("max_nonce_retries must be at least 1".into()));
        }
        if self.coordinator.backend_timeout_ms == 0 {
            return Err(Error::Config("backend_timeout_ms must be positive".into()));
        }
        if self.coordinator.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}: {e}")))
}

/// Intent coordinator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Attempts at finding a free intent nonce before giving up
    pub max_nonce_retries: u32,
    /// Upper bound on a single backend invocation
    pub backend_timeout_ms: u64,
    /// Interval between poller scans
    pub poll_interval_ms: u64,
    /// Whether the poller accepts pending intents on behalf of its agent
    pub auto_accept: bool,
    /// Options passed to every backend invocation
    pub invocation: InvocationOptions,
}

impl CoordinatorConfig {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    /// Never zero; `tokio::time::interval` rejects a zero period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_nonce_retries: 8,
            backend_timeout_ms: 30_000,
            poll_interval_ms: 5_000,
            auto_accept: false,
            invocation: InvocationOptions::default(),
        }
    }
}

/// Blob store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Bodies up to this many bytes are stored inline as `data:` locators
    pub inline_threshold: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            inline_threshold: 256,
        }
    }
}
