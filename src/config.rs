//! Configuration loading and validation.
//!
//! Hosts own the config file; the adapter only reads it. The file carries
//! the gateway token indirection (an environment variable name, never the
//! token itself) plus the adapter tunables, all optional with defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::bridge::BridgeOptions;

/// Adapter configuration as read from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Environment variable holding the gateway bot token.
    #[serde(default = "default_token_env")]
    pub gateway_token_env: String,

    /// Retention window for cached gateway messages, in seconds.
    #[serde(default = "default_retention_secs")]
    pub cache_retention_secs: u64,

    /// Minimum gap between typing activities per user, in seconds.
    #[serde(default = "default_typing_debounce_secs")]
    pub typing_debounce_secs: f64,

    /// Closing message for end-of-conversation activities without text.
    #[serde(default = "default_end_text")]
    pub end_of_conversation_text: String,
}

fn default_token_env() -> String {
    "GATEWAY_BOT_TOKEN".to_owned()
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_typing_debounce_secs() -> f64 {
    3.0
}

fn default_end_text() -> String {
    "The conversation has ended.".to_owned()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            gateway_token_env: default_token_env(),
            cache_retention_secs: default_retention_secs(),
            typing_debounce_secs: default_typing_debounce_secs(),
            end_of_conversation_text: default_end_text(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty token variable name, a zero retention
    /// window, or a non-finite/negative typing debounce.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gateway_token_env.trim().is_empty() {
            anyhow::bail!("gateway_token_env must not be empty");
        }
        if self.cache_retention_secs == 0 {
            anyhow::bail!("cache_retention_secs must be greater than zero");
        }
        if !self.typing_debounce_secs.is_finite() || self.typing_debounce_secs < 0.0 {
            anyhow::bail!(
                "typing_debounce_secs must be a non-negative number, got {}",
                self.typing_debounce_secs
            );
        }
        Ok(())
    }

    /// Adapter tunables derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the typing debounce cannot be represented as a
    /// duration; [`Self::validate`] catches this earlier for loaded files.
    pub fn options(&self) -> anyhow::Result<BridgeOptions> {
        let typing_debounce = Duration::try_from_secs_f64(self.typing_debounce_secs)
            .map_err(|e| anyhow::anyhow!("invalid typing_debounce_secs: {e}"))?;
        Ok(BridgeOptions {
            typing_debounce,
            cache_retention: Duration::from_secs(self.cache_retention_secs),
            end_of_conversation_text: self.end_of_conversation_text.clone(),
        })
    }

    /// Read the gateway token from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or empty.
    pub fn gateway_token(&self) -> anyhow::Result<String> {
        let token = std::env::var(&self.gateway_token_env)
            .with_context(|| format!("environment variable {} not set", self.gateway_token_env))?;
        if token.trim().is_empty() {
            anyhow::bail!("environment variable {} is empty", self.gateway_token_env);
        }
        Ok(token)
    }
}
