//! Central place for defaults and environment key names.
//!
//! Model math constants (Adam betas, init scale, norm epsilon) live here too
//! so the optimizer and model modules share one source of truth.

/// Environment variable prefix (e.g. `CHARGPT_SEED`).
pub(crate) const ENV_PREFIX: &str = "CHARGPT_";

// --- Env key suffixes (full key = ENV_PREFIX + suffix) ---

pub(crate) const ENV_SEED: &str = "SEED";
pub(crate) const ENV_INPUT_PATH: &str = "INPUT_PATH";
pub(crate) const ENV_N_EMBED: &str = "N_EMBED";
pub(crate) const ENV_N_HEAD: &str = "N_HEAD";
pub(crate) const ENV_N_LAYER: &str = "N_LAYER";
pub(crate) const ENV_BLOCK_SIZE: &str = "BLOCK_SIZE";
pub(crate) const ENV_LEARNING_RATE: &str = "LEARNING_RATE";
pub(crate) const ENV_TRAIN_CALLS: &str = "TRAIN_CALLS";
pub(crate) const ENV_STEPS_PER_CALL: &str = "STEPS_PER_CALL";
pub(crate) const ENV_BATCH_SIZE: &str = "BATCH_SIZE";
pub(crate) const ENV_LOSS_LOG_EVERY: &str = "LOSS_LOG_EVERY";
pub(crate) const ENV_SAMPLE_SIZE: &str = "SAMPLE_SIZE";
pub(crate) const ENV_TEMPERATURE: &str = "TEMPERATURE";
pub(crate) const ENV_TOP_K: &str = "TOP_K";
pub(crate) const ENV_MIN_LEN: &str = "MIN_LEN";

// --- Model hyperparameter defaults ---

pub(crate) const DEFAULT_N_EMBED: usize = 16;
pub(crate) const DEFAULT_N_HEAD: usize = 4;
pub(crate) const DEFAULT_N_LAYER: usize = 1;
pub(crate) const DEFAULT_BLOCK_SIZE: usize = 16;
pub(crate) const DEFAULT_LEARNING_RATE: f64 = 0.01;

/// MLP hidden size = MLP_RATIO * n_embed (standard 4x in transformers).
pub(crate) const MLP_RATIO: usize = 4;
/// Weight init: Gaussian standard deviation.
pub(crate) const INIT_STD: f64 = 0.02;
/// Epsilon for RMSNorm numerical stability.
pub(crate) const RMSNORM_EPS: f64 = 1e-5;

// --- Adam optimizer constants ---

/// First-moment decay. 0.85 is a deliberate tuning choice for the tiny
/// corpora this model trains on, lower than the common 0.9 default.
pub(crate) const BETA1: f64 = 0.85;
pub(crate) const BETA2: f64 = 0.99;
pub(crate) const EPSILON: f64 = 1e-8;

// --- Trainer defaults ---

pub(crate) const DEFAULT_STEPS_PER_CALL: usize = 2;
pub(crate) const DEFAULT_BATCH_SIZE: usize = 4;

// --- Sampling defaults ---

/// Temperature applied when the caller passes a non-positive one.
pub(crate) const DEFAULT_TEMPERATURE: f64 = 0.7;
pub(crate) const DEFAULT_TOP_K: usize = 5;
pub(crate) const DEFAULT_MIN_LEN: usize = 3;
/// Candidates recorded per trace step.
pub(crate) const TRACE_TOP_K: usize = 5;

// --- Demo run defaults ---

pub(crate) const DEFAULT_SEED: u64 = 42;
pub(crate) const DEFAULT_INPUT_PATH: &str = "data/input.txt";
pub(crate) const DEFAULT_TRAIN_CALLS: usize = 200;
pub(crate) const DEFAULT_LOSS_LOG_EVERY: usize = 10;
pub(crate) const DEFAULT_SAMPLE_SIZE: usize = 5;
