//! Parameter store: vocabulary, typed weight matrices, flat parameter list,
//! and Adam moment buffers.
//!
//! Every matrix entry is one autograd leaf, appended to the flat `params`
//! list at creation so the optimizer's moment buffers line up with it by
//! index. Weights are addressed through [`Weights`]/[`LayerWeights`] structs
//! rather than a name-keyed map, so a missing matrix is a compile error, not
//! a runtime lookup failure.

mod forward;

pub use forward::{linear, rms_norm, softmax, KvCache};

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::autograd::NodeRef;
use crate::config::constants::{INIT_STD, MLP_RATIO};
use crate::config::Config;
use crate::tokenizer::Vocab;

/// A weight matrix stored row-major: `w[out][in]`.
pub type Matrix = Vec<Vec<NodeRef>>;

/// Weights of one transformer block.
pub struct LayerWeights {
    /// Query projection, `n_embed x n_embed`.
    pub attn_wq: Matrix,
    /// Key projection, `n_embed x n_embed`.
    pub attn_wk: Matrix,
    /// Value projection, `n_embed x n_embed`.
    pub attn_wv: Matrix,
    /// Output projection after head concat, `n_embed x n_embed`.
    pub attn_wo: Matrix,
    /// MLP up-projection, `4*n_embed x n_embed`.
    pub mlp_fc1: Matrix,
    /// MLP down-projection, `n_embed x 4*n_embed`.
    pub mlp_fc2: Matrix,
}

/// All trainable matrices of the model.
pub struct Weights {
    /// Token embedding, `vocab_size x n_embed`.
    pub wte: Matrix,
    /// Position embedding, `block_size x n_embed`.
    pub wpe: Matrix,
    /// Output head, `vocab_size x n_embed`.
    pub lm_head: Matrix,
    /// One entry per transformer block.
    pub layers: Vec<LayerWeights>,
}

/// The model: hyperparameters, vocabulary, weights, and optimizer state.
///
/// Built once per initialize call and replaced wholesale on the next one.
pub struct Model {
    pub(crate) config: Config,
    pub(crate) vocab: Vocab,
    pub(crate) params: Vec<NodeRef>,
    pub(crate) weights: Weights,
    pub(crate) adam_m: Vec<f64>,
    pub(crate) adam_v: Vec<f64>,
    pub(crate) steps: usize,
}

/// Creates a `rows x cols` matrix of Gaussian(0, [`INIT_STD`]) leaves,
/// registering each entry in `params` as it is created.
fn init_matrix(
    rows: usize,
    cols: usize,
    normal: &Normal<f64>,
    rng: &mut StdRng,
    params: &mut Vec<NodeRef>,
) -> Matrix {
    (0..rows)
        .map(|_| {
            (0..cols)
                .map(|_| {
                    let leaf = NodeRef::new(normal.sample(rng));
                    params.push(leaf.clone());
                    leaf
                })
                .collect()
        })
        .collect()
}

impl Model {
    /// Builds the vocabulary from `docs` and initializes all weights.
    ///
    /// `config` is assumed validated (the session validates before calling).
    /// Creation order is fixed (wte, wpe, lm_head, then per layer q/k/v/o
    /// and the two MLP matrices) so the flat list and moment buffers stay
    /// aligned across identical configs.
    #[must_use]
    pub fn new(config: Config, docs: &[String], rng: &mut StdRng) -> Self {
        let vocab = Vocab::from_docs(docs);
        let vocab_size = vocab.size();
        let n_embed = config.n_embed;

        let normal = Normal::new(0.0, INIT_STD).unwrap();
        let mut params = Vec::new();

        let wte = init_matrix(vocab_size, n_embed, &normal, rng, &mut params);
        let wpe = init_matrix(config.block_size, n_embed, &normal, rng, &mut params);
        let lm_head = init_matrix(vocab_size, n_embed, &normal, rng, &mut params);

        let layers = (0..config.n_layer)
            .map(|_| LayerWeights {
                attn_wq: init_matrix(n_embed, n_embed, &normal, rng, &mut params),
                attn_wk: init_matrix(n_embed, n_embed, &normal, rng, &mut params),
                attn_wv: init_matrix(n_embed, n_embed, &normal, rng, &mut params),
                attn_wo: init_matrix(n_embed, n_embed, &normal, rng, &mut params),
                mlp_fc1: init_matrix(MLP_RATIO * n_embed, n_embed, &normal, rng, &mut params),
                mlp_fc2: init_matrix(n_embed, MLP_RATIO * n_embed, &normal, rng, &mut params),
            })
            .collect();

        let adam_m = vec![0.0; params.len()];
        let adam_v = vec![0.0; params.len()];

        Model {
            config,
            vocab,
            params,
            weights: Weights {
                wte,
                wpe,
                lm_head,
                layers,
            },
            adam_m,
            adam_v,
            steps: 0,
        }
    }

    /// Model hyperparameters.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The model's vocabulary.
    #[must_use]
    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Number of trainable scalar parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Completed optimizer steps.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Zeros every parameter gradient. Must run before a fresh gradient
    /// accumulation pass; the batched trainer calls it per iteration.
    pub fn zero_grads(&self) {
        for p in &self.params {
            p.zero_grad();
        }
    }

    /// Scales every parameter gradient (mini-batch averaging).
    pub fn scale_grads(&self, factor: f64) {
        for p in &self.params {
            p.scale_grad(factor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn tiny_config() -> Config {
        Config {
            n_embed: 4,
            n_head: 2,
            n_layer: 1,
            block_size: 8,
            learning_rate: 0.05,
        }
    }

    /// Closed-form parameter count: wte + wpe + lm_head + per-layer
    /// (4 attention matrices + 2 MLP matrices).
    fn expected_params(cfg: &Config, vocab_size: usize) -> usize {
        vocab_size * cfg.n_embed
            + cfg.block_size * cfg.n_embed
            + vocab_size * cfg.n_embed
            + cfg.n_layer
                * (4 * cfg.n_embed * cfg.n_embed
                    + (MLP_RATIO * cfg.n_embed) * cfg.n_embed
                    + cfg.n_embed * (MLP_RATIO * cfg.n_embed))
    }

    #[test]
    fn param_count_matches_closed_form() {
        let mut rng = StdRng::seed_from_u64(1);
        let docs = vec!["ab".to_string(), "ba".to_string()];
        let model = Model::new(tiny_config(), &docs, &mut rng);
        // vocab = {a, b} + control token
        assert_eq!(model.vocab().size(), 3);
        assert_eq!(model.param_count(), expected_params(model.config(), 3));
    }

    #[test]
    fn reinit_keeps_param_count_and_vocab_order() {
        let docs = vec!["hello".to_string(), "world".to_string()];
        let mut rng = StdRng::seed_from_u64(2);
        let first = Model::new(tiny_config(), &docs, &mut rng);
        let second = Model::new(tiny_config(), &docs, &mut rng);
        assert_eq!(first.param_count(), second.param_count());
        assert_eq!(first.vocab().chars(), second.vocab().chars());
    }

    #[test]
    fn weights_register_into_flat_params_in_creation_order() {
        let mut rng = StdRng::seed_from_u64(3);
        let docs = vec!["ab".to_string()];
        let model = Model::new(tiny_config(), &docs, &mut rng);
        // First flat entry is wte[0][0]: nudging one must show in the other.
        model.params[0].set_data(42.0);
        assert_eq!(model.weights.wte[0][0].data(), 42.0);
    }

    #[test]
    fn zero_and_scale_grads_touch_every_param() {
        let mut rng = StdRng::seed_from_u64(4);
        let docs = vec!["ab".to_string()];
        let model = Model::new(tiny_config(), &docs, &mut rng);
        let loss = model
            .params
            .iter()
            .fold(NodeRef::new(0.0), |acc, p| &acc + p);
        loss.backward();
        model.scale_grads(0.5);
        assert!(model.params.iter().all(|p| (p.grad() - 0.5).abs() < 1e-12));
        model.zero_grads();
        assert!(model.params.iter().all(|p| p.grad() == 0.0));
    }

    #[test]
    fn moment_buffers_align_with_params() {
        let mut rng = StdRng::seed_from_u64(5);
        let docs = vec!["abc".to_string()];
        let model = Model::new(tiny_config(), &docs, &mut rng);
        assert_eq!(model.adam_m.len(), model.param_count());
        assert_eq!(model.adam_v.len(), model.param_count());
    }
}
