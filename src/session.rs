//! The session: the crate's single entry point for a transport layer.
//!
//! A [`Session`] owns at most one model plus its training documents and the
//! process-wide RNG, all behind one mutex. Every operation holds the lock
//! for its full duration, so training calls and generations serialize in
//! lock-queue order; nothing here suspends or times out. Re-initializing
//! replaces the model wholesale.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::config::constants::{DEFAULT_BATCH_SIZE, DEFAULT_STEPS_PER_CALL};
use crate::config::{Config, ConfigError};
use crate::model::Model;
use crate::sampler::{self, GenerateOptions, Trace};
use crate::trainer::{self, TrainError, TrainSummary};

/// Result of [`Session::initialize`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct InitSummary {
    /// Number of trainable scalar parameters in the new model.
    pub param_count: usize,
}

/// Errors surfaced at the session boundary.
#[derive(Debug)]
pub enum SessionError {
    /// An operation needing a model ran before `initialize`.
    NotInitialized,

    /// Training was requested but the session holds no documents.
    NoDocuments,

    /// The supplied hyperparameters failed validation.
    Config(ConfigError),

    /// The training loop failed.
    Train(TrainError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotInitialized => write!(f, "session: model not initialized"),
            SessionError::NoDocuments => write!(f, "session: no training documents provided"),
            SessionError::Config(e) => write!(f, "session: {e}"),
            SessionError::Train(e) => write!(f, "session: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Config(e) => Some(e),
            SessionError::Train(e) => Some(e),
            SessionError::NotInitialized | SessionError::NoDocuments => None,
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        SessionError::Config(e)
    }
}

impl From<TrainError> for SessionError {
    fn from(e: TrainError) -> Self {
        SessionError::Train(e)
    }
}

struct ModelState {
    model: Model,
    docs: Vec<String>,
}

struct Inner {
    rng: StdRng,
    state: Option<ModelState>,
}

/// Handle to one model's lifecycle. Cheap to share by reference; all
/// mutation is serialized internally.
pub struct Session {
    inner: Mutex<Inner>,
}

impl Session {
    /// New empty session with the RNG seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// New empty session with a fixed seed, for reproducible runs.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Session {
            inner: Mutex::new(Inner { rng, state: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic mid-operation can leave a half-trained model, which is
        // still safe to use or replace; keep going instead of poisoning
        // every later call.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds a fresh model from `docs` and `config`, discarding any
    /// previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the hyperparameters are invalid.
    pub fn initialize(
        &self,
        docs: Vec<String>,
        config: Config,
    ) -> Result<InitSummary, SessionError> {
        config.validate()?;
        let mut inner = self.lock();
        let model = Model::new(config, &docs, &mut inner.rng);
        let param_count = model.param_count();
        inner.state = Some(ModelState { model, docs });
        Ok(InitSummary { param_count })
    }

    /// Runs batched training steps (defaults: 2 steps of batch 4) and
    /// returns the last step's diagnostics.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotInitialized`] before `initialize`,
    /// [`SessionError::NoDocuments`] when the document set is empty, and
    /// [`SessionError::Train`] for failures inside the loop.
    pub fn train_step(
        &self,
        steps_per_call: Option<usize>,
        batch_size: Option<usize>,
    ) -> Result<TrainSummary, SessionError> {
        let steps = steps_per_call.unwrap_or(DEFAULT_STEPS_PER_CALL);
        let batch = batch_size.unwrap_or(DEFAULT_BATCH_SIZE);

        let mut inner = self.lock();
        let Inner { rng, state } = &mut *inner;
        let state = state.as_mut().ok_or(SessionError::NotInitialized)?;
        if state.docs.is_empty() {
            return Err(SessionError::NoDocuments);
        }
        let summary = trainer::train_batched_steps(&mut state.model, &state.docs, steps, batch, rng)?;
        Ok(summary)
    }

    /// Samples one text from the current model.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotInitialized`] before `initialize`.
    pub fn generate(&self, opts: GenerateOptions) -> Result<String, SessionError> {
        let mut inner = self.lock();
        let Inner { rng, state } = &mut *inner;
        let state = state.as_ref().ok_or(SessionError::NotInitialized)?;
        Ok(sampler::generate(&state.model, opts, rng))
    }

    /// Samples one text and explains every token choice.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotInitialized`] before `initialize`.
    pub fn generate_with_trace(&self, opts: GenerateOptions) -> Result<Trace, SessionError> {
        let mut inner = self.lock();
        let Inner { rng, state } = &mut *inner;
        let state = state.as_ref().ok_or(SessionError::NotInitialized)?;
        Ok(sampler::generate_with_trace(&state.model, opts, rng))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
