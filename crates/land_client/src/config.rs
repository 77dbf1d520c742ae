//! Client configuration.
//!
//! Built once at startup from an optional JSON file plus command-line
//! overrides, then handed down to the session by reference.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Default server address.
pub const DEFAULT_SERVER: &str = "127.0.0.1:4343";

/// Configuration for one client process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address, `host:port`.
    pub server: String,
    /// Login name. Required.
    pub username: String,
    /// Target ticks per second of the local loop.
    pub tick_rate: f64,
    /// Upper bound for a single tick's delta, in milliseconds.
    pub max_delta_ms: u64,
    /// Delay before the first "which entity do I control" request.
    pub handshake_delay_ms: u64,
    /// Delay before re-asking when the answer names an unknown entity.
    pub retry_delay_ms: u64,
    /// How often to re-ask before giving up on the binding.
    pub max_binding_retries: u32,
    /// Write logs here instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            username: String::new(),
            tick_rate: 23.0,
            max_delta_ms: 250,
            handshake_delay_ms: 50,
            retry_delay_ms: 50,
            max_binding_retries: 40,
            log_file: None,
        }
    }
}

impl ClientConfig {
    /// Create a config for `username` with default settings.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Load a config from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Parse a config from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Override the server address.
    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Override the login name.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Override the log file.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Check the settings a session cannot start without.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing or invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            bail!("missing server address in config");
        }
        if self.username.trim().is_empty() {
            bail!("missing username in config");
        }
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            bail!("tick_rate must be positive, got {}", self.tick_rate);
        }
        Ok(())
    }

    /// Interval between ticks.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }

    /// Upper bound for one tick's delta.
    #[must_use]
    pub fn max_delta(&self) -> Duration {
        Duration::from_millis(self.max_delta_ms)
    }

    /// Delay before the first binding request.
    #[must_use]
    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }

    /// Delay before re-asking for the binding.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.max_delta(), Duration::from_millis(250));
        assert_eq!(config.handshake_delay(), Duration::from_millis(50));
        assert!(config.validate().is_err(), "username is required");
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            ClientConfig::from_json(r#"{ "username": "alice", "server": "10.0.0.1:9000" }"#)
                .unwrap();
        assert_eq!(config.username, "alice");
        assert_eq!(config.server, "10.0.0.1:9000");
        assert_eq!(config.max_binding_retries, 40);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(ClientConfig::from_json("{ username: ").is_err());
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::new("bob")
            .with_server("example:1")
            .with_username("carol")
            .with_log_file("client.log");
        assert_eq!(config.username, "carol");
        assert_eq!(config.server, "example:1");
        assert_eq!(config.log_file, Some(PathBuf::from("client.log")));
    }

    #[test]
    fn test_validate_tick_rate() {
        let mut config = ClientConfig::new("alice");
        config.tick_rate = 0.0;
        assert!(config.validate().is_err());
    }
}
