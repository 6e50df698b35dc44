//! Configuration errors.
//!
//! Every other module defines its own error enum next to the code that
//! raises it.

use thiserror::Error;

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config file could not be parsed or holds an invalid value.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// No config file exists in any searched location.
    #[error("no configuration file found")]
    NotFound,
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
