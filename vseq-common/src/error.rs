//! Common error types for the vseq crates

use thiserror::Error;

/// Common result type for vseq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared across vseq crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
