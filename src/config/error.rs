//! Configuration errors.
//!
//! Everything the config module can reject (validation rules and env
//! loading) surfaces as a [`ConfigError`].

use std::fmt;

/// Errors produced when building or validating configuration.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Hyperparameter values are inconsistent or out of range
    /// (e.g. `n_embed` not divisible by `n_head`).
    Validation(String),

    /// An environment variable was set but could not be read
    /// (e.g. invalid Unicode).
    EnvVar {
        /// Full environment variable name.
        key: String,
        /// Underlying cause.
        message: String,
    },

    /// An environment variable was set but did not parse into the expected
    /// type (e.g. `CHARGPT_SEED=abc`).
    Parse {
        /// Full environment variable name.
        key: String,
        /// Raw value that failed to parse.
        value: String,
        /// Parse failure description.
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Validation(m) => write!(f, "config validation: {m}"),
            ConfigError::EnvVar { key, message } => write!(f, "env var {key}: {message}"),
            ConfigError::Parse {
                key,
                value,
                message,
            } => write!(f, "env var {key}={value:?}: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
