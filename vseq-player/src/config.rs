//! Player configuration
//!
//! Bootstrap configuration loaded from TOML. Every field has a built-in
//! default, so an absent file (or an absent key) is never fatal.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--muted, --rate, --no-autoplay)
//! 2. Configuration file (resolved by `vseq_common::config::ConfigFileResolver`)
//! 3. Built-in defaults (code constants)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use vseq_common::config::{load_or_default, ConfigFileResolver};

/// Placeholder replaced by the segment identifier in `asset_path_template`
pub const ID_PLACEHOLDER: &str = "{id}";

/// Sequence player configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Guard window before segment end that triggers the transition
    pub near_end_epsilon_ms: u64,

    /// Delay between starting the preload handle and swapping roles
    pub transition_delay_ms: u64,

    /// Upper bound on a single asset resolution
    pub resolve_timeout_ms: u64,

    /// Upper bound on a single duration probe
    pub probe_timeout_ms: u64,

    /// Start playback as soon as the first segment is ready
    pub autoplay: bool,

    /// Initial mute preference
    pub muted: bool,

    /// Initial playback rate (1.0 = normal speed)
    pub playback_rate: f64,

    /// Interval at which media handles report time updates
    pub time_update_interval_ms: u64,

    /// Object storage path for a segment, `{id}` is substituted
    pub asset_path_template: String,

    /// Artist label attached to resolved sources
    pub metadata_artist: Option<String>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            near_end_epsilon_ms: 500,
            transition_delay_ms: 500,
            resolve_timeout_ms: 10_000,
            probe_timeout_ms: 10_000,
            autoplay: true,
            muted: false,
            playback_rate: 1.0,
            time_update_interval_ms: 500,
            asset_path_template: "Videos/{id}.mp4".to_string(),
            metadata_artist: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Resolve, load and validate the configuration file
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let resolver = ConfigFileResolver::new();
        let config: PlayerConfig = load_or_default(&resolver, cli_path)?;
        config.validate()?;
        info!(
            transition_delay_ms = config.transition_delay_ms,
            near_end_epsilon_ms = config.near_end_epsilon_ms,
            "Player configuration loaded"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PlayerConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot operate with
    pub fn validate(&self) -> Result<()> {
        if !(self.playback_rate.is_finite() && self.playback_rate > 0.0) {
            return Err(Error::Config(format!(
                "playback_rate must be > 0, got {}",
                self.playback_rate
            )));
        }
        if self.resolve_timeout_ms == 0 || self.probe_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        if self.time_update_interval_ms == 0 {
            return Err(Error::Config(
                "time_update_interval_ms must be non-zero".to_string(),
            ));
        }
        if !self.asset_path_template.contains(ID_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "asset_path_template must contain {}: {:?}",
                ID_PLACEHOLDER, self.asset_path_template
            )));
        }
        Ok(())
    }

    /// Object storage path for a segment identifier
    pub fn asset_path(&self, id: &str) -> String {
        self.asset_path_template.replace(ID_PLACEHOLDER, id)
    }

    /// Near-end guard window in seconds
    pub fn near_end_epsilon_secs(&self) -> f64 {
        self.near_end_epsilon_ms as f64 / 1000.0
    }

    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn time_update_interval(&self) -> Duration {
        Duration::from_millis(self.time_update_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.near_end_epsilon_ms, 500);
        assert_eq!(config.transition_delay(), Duration::from_millis(500));
        assert_eq!(config.resolve_timeout(), Duration::from_secs(10));
        assert!(config.autoplay);
        assert!(!config.muted);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_asset_path_substitution() {
        let config = PlayerConfig::default();
        assert_eq!(config.asset_path("W059"), "Videos/W059.mp4");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PlayerConfig::from_toml_str(
            r#"
            transition_delay_ms = 250
            muted = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.transition_delay_ms, 250);
        assert!(config.muted);
        assert_eq!(config.near_end_epsilon_ms, 500);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_rejects_bad_rate() {
        let result = PlayerConfig::from_toml_str("playback_rate = 0.0");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_template_without_placeholder() {
        let result = PlayerConfig::from_toml_str("asset_path_template = \"Videos/all.mp4\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let result = PlayerConfig::from_toml_str("probe_timeout_ms = 0");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
