use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is not a valid value")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must not be zero")]
    Zero(&'static str),
    #[error("base url must not be empty")]
    EmptyBaseUrl,
}

/// Runtime settings of a [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    /// Index status poll period while the backend index is building.
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Abort in-flight requests of older generations when a new one is
    /// issued. Stale responses are dropped either way.
    pub cancel_superseded: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 1_000,
            request_timeout_ms: 30_000,
            cancel_superseded: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `EXPLORER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            base_url: lookup("EXPLORER_BASE_URL").unwrap_or(defaults.base_url),
            poll_interval_ms: env_var(
                &lookup,
                "EXPLORER_POLL_INTERVAL_MS",
                defaults.poll_interval_ms,
            )?,
            request_timeout_ms: env_var(
                &lookup,
                "EXPLORER_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            )?,
            cancel_superseded: env_var(
                &lookup,
                "EXPLORER_CANCEL_SUPERSEDED",
                defaults.cancel_superseded,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Zero("request_timeout_ms"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn env_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
