//! Configuration file resolution and loading
//!
//! Configuration file priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`<config_dir>/vseq/config.toml`)
//! 4. No file: built-in defaults (fallback)
//!
//! A missing configuration file never terminates the process. Callers get
//! `None` from the resolver and fall back to compiled defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "VSEQ_CONFIG";

/// Directory name used under the platform config directory
const APP_DIR_NAME: &str = "vseq";

/// File name of the configuration file
const CONFIG_FILE_NAME: &str = "config.toml";

/// Where a resolved configuration path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
}

/// Resolves the configuration file path following the priority order above
#[derive(Debug, Clone)]
pub struct ConfigFileResolver {
    env_var_name: String,
    user_config_dir: Option<PathBuf>,
}

impl ConfigFileResolver {
    /// Create a resolver using the default environment variable and the
    /// platform config directory
    pub fn new() -> Self {
        Self {
            env_var_name: CONFIG_ENV_VAR.to_string(),
            user_config_dir: dirs::config_dir().map(|d| d.join(APP_DIR_NAME)),
        }
    }

    /// Override the environment variable consulted at priority 2
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = name.into();
        self
    }

    /// Override the directory consulted at priority 3
    pub fn with_user_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_config_dir = dir;
        self
    }

    /// Resolve the configuration file path
    ///
    /// CLI and environment paths are returned even when the file does not
    /// exist, so the caller can warn about it. The user config directory is
    /// only used if the file is actually present.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some((path.to_path_buf(), ConfigSource::CommandLine));
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                return Some((PathBuf::from(path), ConfigSource::Environment));
            }
        }

        // Priority 3: User config directory
        if let Some(dir) = &self.user_config_dir {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some((candidate, ConfigSource::UserConfigDir));
            }
        }

        // Priority 4: built-in defaults
        None
    }
}

impl Default for ConfigFileResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a TOML configuration file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
    let parsed = toml::from_str::<T>(&content)?;
    debug!("Parsed configuration file {:?}", path);
    Ok(parsed)
}

/// Resolve and load a configuration file, falling back to `T::default()`
///
/// A missing file logs a warning and yields defaults. A file that exists but
/// fails to parse is an error.
pub fn load_or_default<T>(resolver: &ConfigFileResolver, cli_arg: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match resolver.resolve(cli_arg) {
        Some((path, source)) => {
            if !path.exists() {
                warn!(
                    "Config file {:?} ({:?}) not found, using built-in defaults",
                    path, source
                );
                return Ok(T::default());
            }
            info!("Loading configuration from {:?} ({:?})", path, source);
            load_toml(&path)
        }
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(T::default())
        }
    }
}
