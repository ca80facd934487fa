//! # chargpt
//!
//! A character-level GPT you can watch think: a scalar autograd engine, a
//! transformer forward pass with an incremental KV cache, Adam training, and
//! inverse-CDF sampling that can explain every token it picks.
//!
//! All state lives behind a [`Session`] handle; `initialize` builds a model
//! from a small corpus, `train_step` runs batched optimizer steps, and
//! `generate`/`generate_with_trace` sample text from it.

pub mod autograd;
pub mod config;
pub mod data;
pub mod model;
pub mod optim;
pub mod sampler;
pub mod session;
pub mod tokenizer;
pub mod trainer;

pub use autograd::NodeRef;
pub use config::{Config, ConfigError, RunSettings};
pub use data::{load_docs, DataError};
pub use model::{KvCache, Model};
pub use sampler::{GenerateOptions, Trace, TraceCandidate, TraceStep};
pub use session::{InitSummary, Session, SessionError};
pub use tokenizer::{TokenizerError, Vocab};
pub use trainer::{TrainError, TrainSummary};
