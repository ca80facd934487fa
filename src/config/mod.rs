//! Model hyperparameters and demo-run settings.
//!
//! [`Config`] is the model's hyperparameter set; validate it with
//! [`Config::validate`] before building a model. [`RunSettings`] drives the
//! demo binary and loads from `CHARGPT_*` environment variables via
//! [`from_env`]. Defaults and env key names live in the `constants`
//! submodule.

mod builder;
pub(crate) mod constants;
mod error;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_BLOCK_SIZE, DEFAULT_INPUT_PATH, DEFAULT_LEARNING_RATE,
    DEFAULT_LOSS_LOG_EVERY, DEFAULT_MIN_LEN, DEFAULT_N_EMBED, DEFAULT_N_HEAD, DEFAULT_N_LAYER,
    DEFAULT_SAMPLE_SIZE, DEFAULT_SEED, DEFAULT_STEPS_PER_CALL, DEFAULT_TEMPERATURE, DEFAULT_TOP_K,
    DEFAULT_TRAIN_CALLS,
};

pub use builder::{env_key, env_parsed, env_string, from_env};
pub use error::ConfigError;

/// Transformer hyperparameters.
///
/// `n_embed` must be divisible by `n_head`; the per-head width is
/// [`Config::head_dim`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Embedding width (features per token).
    #[serde(alias = "n_embd")]
    pub n_embed: usize,
    /// Number of attention heads.
    pub n_head: usize,
    /// Number of stacked transformer blocks.
    pub n_layer: usize,
    /// Maximum sequence length processed in one pass.
    pub block_size: usize,
    /// Adam learning rate.
    pub learning_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n_embed: DEFAULT_N_EMBED,
            n_head: DEFAULT_N_HEAD,
            n_layer: DEFAULT_N_LAYER,
            block_size: DEFAULT_BLOCK_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

impl Config {
    /// Validates hyperparameter consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the rule that failed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_head == 0 {
            return Err(ConfigError::Validation(
                "n_head must be greater than 0".to_string(),
            ));
        }
        if self.n_embed == 0 || self.n_embed % self.n_head != 0 {
            return Err(ConfigError::Validation(format!(
                "n_embed ({}) must be a positive multiple of n_head ({})",
                self.n_embed, self.n_head
            )));
        }
        if self.n_layer == 0 {
            return Err(ConfigError::Validation(
                "n_layer must be greater than 0".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Validation(
                "block_size must be greater than 0".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ConfigError::Validation(
                "learning_rate must be positive and finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-head width (`n_embed / n_head`).
    #[must_use]
    pub fn head_dim(&self) -> usize {
        self.n_embed / self.n_head
    }
}

/// Settings for the demo binary: where the corpus lives, how long to train,
/// and how to sample afterwards. Not part of the core API surface.
#[derive(Clone, Debug)]
pub struct RunSettings {
    /// RNG seed for a reproducible run.
    pub seed: u64,
    /// Corpus path (one document per line).
    pub input_path: PathBuf,
    /// Number of `train_step` calls to make.
    pub train_calls: usize,
    /// Optimizer steps per call.
    pub steps_per_call: usize,
    /// Examples accumulated per optimizer step.
    pub batch_size: usize,
    /// Print loss every this many calls.
    pub loss_log_every: usize,
    /// Samples to print after training.
    pub sample_size: usize,
    /// Sampling temperature.
    pub temperature: f64,
    /// Top-k filter for sampling (0 disables).
    pub top_k: usize,
    /// Minimum generated length before the end token is allowed.
    pub min_len: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            train_calls: DEFAULT_TRAIN_CALLS,
            steps_per_call: DEFAULT_STEPS_PER_CALL,
            batch_size: DEFAULT_BATCH_SIZE,
            loss_log_every: DEFAULT_LOSS_LOG_EVERY,
            sample_size: DEFAULT_SAMPLE_SIZE,
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            min_len: DEFAULT_MIN_LEN,
        }
    }
}
