//! Build [`RunSettings`] from environment variables.
//!
//! [`env_string`] and [`env_parsed`] read `CHARGPT_*` keys with typed
//! errors; key names are centralized in the `constants` submodule.

use std::path::PathBuf;

use super::constants::{
    ENV_BATCH_SIZE, ENV_BLOCK_SIZE, ENV_INPUT_PATH, ENV_LEARNING_RATE, ENV_LOSS_LOG_EVERY,
    ENV_MIN_LEN, ENV_N_EMBED, ENV_N_HEAD, ENV_N_LAYER, ENV_PREFIX, ENV_SAMPLE_SIZE, ENV_SEED,
    ENV_STEPS_PER_CALL, ENV_TEMPERATURE, ENV_TOP_K, ENV_TRAIN_CALLS,
};
use super::{Config, ConfigError, RunSettings};

/// Full environment variable key for a suffix (`SEED` → `CHARGPT_SEED`).
#[must_use]
pub fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

/// Reads an environment variable as a string.
///
/// # Errors
///
/// Returns [`ConfigError::EnvVar`] if the variable is set but unreadable
/// (e.g. not valid Unicode). An unset variable is `Ok(None)`.
pub fn env_string(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(s) => Ok(Some(s)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::EnvVar {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Reads an environment variable and parses it into `T`.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the variable is set but does not parse
/// (e.g. `CHARGPT_SEED=abc` for `u64`). An unset variable is `Ok(None)`.
pub fn env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(s) = env_string(key)? else {
        return Ok(None);
    };
    match s.parse() {
        Ok(t) => Ok(Some(t)),
        Err(e) => Err(ConfigError::Parse {
            key: key.to_string(),
            value: s,
            message: e.to_string(),
        }),
    }
}

/// Builds model [`Config`] and [`RunSettings`] from the environment, falling
/// back to defaults for unset keys.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any *set* variable fails to parse or the
/// resulting hyperparameters fail [`Config::validate`].
pub fn from_env() -> Result<(Config, RunSettings), ConfigError> {
    let config_default = Config::default();
    let config = Config {
        n_embed: env_parsed(&env_key(ENV_N_EMBED))?.unwrap_or(config_default.n_embed),
        n_head: env_parsed(&env_key(ENV_N_HEAD))?.unwrap_or(config_default.n_head),
        n_layer: env_parsed(&env_key(ENV_N_LAYER))?.unwrap_or(config_default.n_layer),
        block_size: env_parsed(&env_key(ENV_BLOCK_SIZE))?.unwrap_or(config_default.block_size),
        learning_rate: env_parsed(&env_key(ENV_LEARNING_RATE))?
            .unwrap_or(config_default.learning_rate),
    };
    config.validate()?;

    let run_default = RunSettings::default();
    let settings = RunSettings {
        seed: env_parsed(&env_key(ENV_SEED))?.unwrap_or(run_default.seed),
        input_path: env_string(&env_key(ENV_INPUT_PATH))?
            .map(PathBuf::from)
            .unwrap_or(run_default.input_path),
        train_calls: env_parsed(&env_key(ENV_TRAIN_CALLS))?.unwrap_or(run_default.train_calls),
        steps_per_call: env_parsed(&env_key(ENV_STEPS_PER_CALL))?
            .unwrap_or(run_default.steps_per_call),
        batch_size: env_parsed(&env_key(ENV_BATCH_SIZE))?.unwrap_or(run_default.batch_size),
        loss_log_every: env_parsed(&env_key(ENV_LOSS_LOG_EVERY))?
            .unwrap_or(run_default.loss_log_every),
        sample_size: env_parsed(&env_key(ENV_SAMPLE_SIZE))?.unwrap_or(run_default.sample_size),
        temperature: env_parsed(&env_key(ENV_TEMPERATURE))?.unwrap_or(run_default.temperature),
        top_k: env_parsed(&env_key(ENV_TOP_K))?.unwrap_or(run_default.top_k),
        min_len: env_parsed(&env_key(ENV_MIN_LEN))?.unwrap_or(run_default.min_len),
    };
    Ok((config, settings))
}
