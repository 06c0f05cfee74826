//! Configuration file resolution and loading tests
//!
//! Tests that manipulate VSEQ_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;
use vseq_common::config::{load_or_default, load_toml, ConfigFileResolver, ConfigSource, CONFIG_ENV_VAR};
use vseq_common::Error;

#[derive(Debug, Deserialize, PartialEq)]
struct SampleConfig {
    #[serde(default = "default_delay")]
    transition_delay_ms: u64,
    #[serde(default)]
    autoplay: bool,
}

fn default_delay() -> u64 {
    500
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            transition_delay_ms: default_delay(),
            autoplay: false,
        }
    }
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_argument() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "env.toml", "autoplay = true\n");
    env::set_var(CONFIG_ENV_VAR, &path);

    let resolver = ConfigFileResolver::new().with_user_config_dir(None);
    let (resolved, source) = resolver.resolve(None).unwrap();

    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, path);
    assert_eq!(source, ConfigSource::Environment);
}

#[test]
#[serial]
fn test_cli_argument_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolver = ConfigFileResolver::new().with_user_config_dir(None);
    let cli = PathBuf::from("/tmp/from-cli.toml");
    let (resolved, source) = resolver.resolve(Some(&cli)).unwrap();

    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, cli);
    assert_eq!(source, ConfigSource::CommandLine);
}

#[test]
#[serial]
fn test_user_config_dir_used_when_file_exists() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "config.toml", "transition_delay_ms = 250\n");

    let resolver = ConfigFileResolver::new().with_user_config_dir(Some(dir.path().to_path_buf()));
    let (resolved, source) = resolver.resolve(None).unwrap();

    assert_eq!(resolved, path);
    assert_eq!(source, ConfigSource::UserConfigDir);

    let config: SampleConfig = load_or_default(&resolver, None).unwrap();
    assert_eq!(config.transition_delay_ms, 250);
    assert!(!config.autoplay);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let resolver = ConfigFileResolver::new().with_user_config_dir(None);
    let missing = PathBuf::from("/nonexistent/vseq/config.toml");

    let config: SampleConfig = load_or_default(&resolver, Some(&missing)).unwrap();
    assert_eq!(config, SampleConfig::default());
}

#[test]
fn test_broken_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "broken.toml", "transition_delay_ms = \"soon\"\n");

    let result = load_toml::<SampleConfig>(&path);
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
fn test_unreadable_path_is_config_error() {
    let result = load_toml::<SampleConfig>(std::path::Path::new("/nonexistent/file.toml"));
    assert!(matches!(result, Err(Error::Config(_))));
}
