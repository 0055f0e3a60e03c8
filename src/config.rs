//! Typed configuration.
//!
//! Process-level settings come from environment variables and are loaded
//! once at startup. Engine settings can also come from a TOML file; the
//! environment overrides the file.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(EngineConfig::default())
    }

    /// Load from the environment, starting from `engine` for any engine
    /// setting the environment leaves unset.
    pub fn from_env_with(engine: EngineConfig) -> Result<Self> {
        Ok(Self {
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            engine: engine.with_env_overrides()?,
        })
    }
}

/// Settings for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Reported on spans and metrics.
    pub name: String,
    /// How many state changes a slow subscriber may fall behind before it
    /// starts missing them.
    pub change_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "reducer".to_string(),
            change_buffer: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad engine config: {e}")))?;
        config.validate()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(name) = optional_var("REDUCER_ENGINE_NAME") {
            self.name = name;
        }
        if let Some(raw) = optional_var("REDUCER_CHANGE_BUFFER") {
            self.change_buffer = raw.parse().map_err(|_| {
                Error::Config(format!("REDUCER_CHANGE_BUFFER must be a positive integer, got {raw:?}"))
            })?;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.change_buffer == 0 {
            return Err(Error::Config("change_buffer must be at least 1".to_string()));
        }
        Ok(self)
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
