//! Forward computation: linear/softmax/rmsnorm primitives, the incremental
//! KV cache, and the single-token autoregressive step.

use crate::autograd::NodeRef;
use crate::config::constants::RMSNORM_EPS;
use crate::model::{Matrix, Model};

/// Per-layer cache of past key and value vectors.
struct LayerCache {
    keys: Vec<Vec<NodeRef>>,
    values: Vec<Vec<NodeRef>>,
}

/// Key/value cache for one sequence: one growing list of k/v vectors per
/// layer, appended to by every [`Model::forward`] call.
///
/// After the step at position `t` each layer holds `t + 1` entries, so
/// attention at `t` only ever sees positions `0..=t`. Build a fresh cache
/// per training example or generation; it is useless across sequences.
pub struct KvCache {
    layers: Vec<LayerCache>,
}

impl KvCache {
    /// Empty cache for a model with `n_layer` blocks.
    #[must_use]
    pub fn new(n_layer: usize) -> Self {
        KvCache {
            layers: (0..n_layer)
                .map(|_| LayerCache {
                    keys: Vec::new(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    /// Number of cached positions in `layer`.
    #[must_use]
    pub fn len(&self, layer: usize) -> usize {
        self.layers[layer].keys.len()
    }

    /// True when nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(|l| l.keys.is_empty())
    }
}

/// Matrix-vector product over node arithmetic: `out[i] = Σ_j w[i][j]·x[j]`.
/// Output length is the row count of `w`.
#[must_use]
pub fn linear(x: &[NodeRef], w: &Matrix) -> Vec<NodeRef> {
    w.iter()
        .map(|row| {
            let mut sum = NodeRef::new(0.0);
            for (wi, xi) in row.iter().zip(x.iter()) {
                sum = &sum + &(wi * xi);
            }
            sum
        })
        .collect()
}

/// Differentiable softmax with the max logit subtracted before
/// exponentiation for numerical stability. Output sums to 1.
#[must_use]
pub fn softmax(logits: &[NodeRef]) -> Vec<NodeRef> {
    let max_val = logits
        .iter()
        .map(NodeRef::data)
        .fold(f64::NEG_INFINITY, f64::max);
    let max_node = NodeRef::new(max_val);

    let exps: Vec<NodeRef> = logits.iter().map(|l| (l - &max_node).exp()).collect();
    let mut total = NodeRef::new(0.0);
    for e in &exps {
        total = &total + e;
    }
    exps.iter().map(|e| e / &total).collect()
}

/// RMS normalization: `y_i = x_i / sqrt(mean(x²) + eps)`. No learned
/// per-channel scale.
#[must_use]
pub fn rms_norm(x: &[NodeRef]) -> Vec<NodeRef> {
    let n = x.len() as f64;
    let mut sum_sq = NodeRef::new(0.0);
    for xi in x {
        sum_sq = &sum_sq + &(xi * xi);
    }
    let ms = &sum_sq / &NodeRef::new(n);
    let scale = (&ms + &NodeRef::new(RMSNORM_EPS)).pow(-0.5);
    x.iter().map(|xi| xi * &scale).collect()
}

impl Model {
    /// One autoregressive step: consumes a token id and its position,
    /// appends this step's keys/values to `cache`, and returns logits over
    /// the vocabulary for the next token.
    #[must_use]
    pub fn forward(&self, token_id: usize, pos_id: usize, cache: &mut KvCache) -> Vec<NodeRef> {
        let n_embed = self.config.n_embed;
        let head_dim = self.config.head_dim();

        // Token + position embedding, then a first normalization.
        let tok_emb = &self.weights.wte[token_id];
        let pos_emb = &self.weights.wpe[pos_id];
        let mut x: Vec<NodeRef> = (0..n_embed)
            .map(|i| &tok_emb[i] + &pos_emb[i])
            .collect();
        x = rms_norm(&x);

        for (layer, lc) in self.weights.layers.iter().zip(cache.layers.iter_mut()) {
            // Pre-norm attention block.
            let x_residual = x.clone();
            x = rms_norm(&x);

            let q = linear(&x, &layer.attn_wq);
            let k = linear(&x, &layer.attn_wk);
            let v = linear(&x, &layer.attn_wv);
            lc.keys.push(k);
            lc.values.push(v);

            let scale = NodeRef::new(1.0 / (head_dim as f64).sqrt());
            let mut x_attn = Vec::with_capacity(n_embed);
            for h in 0..self.config.n_head {
                let hs = h * head_dim;
                let q_h = &q[hs..hs + head_dim];

                // Scaled dot-product score against every cached position.
                let mut attn_logits = Vec::with_capacity(lc.keys.len());
                for k_t in &lc.keys {
                    let mut dot = NodeRef::new(0.0);
                    for (qi, ki) in q_h.iter().zip(k_t[hs..hs + head_dim].iter()) {
                        dot = &dot + &(qi * ki);
                    }
                    attn_logits.push(&dot * &scale);
                }
                let attn_weights = softmax(&attn_logits);

                // Weighted sum of cached values for this head's slice.
                for j in 0..head_dim {
                    let mut out = NodeRef::new(0.0);
                    for (v_t, w_t) in lc.values.iter().zip(attn_weights.iter()) {
                        out = &out + &(w_t * &v_t[hs + j]);
                    }
                    x_attn.push(out);
                }
            }

            x = linear(&x_attn, &layer.attn_wo);
            x = x
                .iter()
                .zip(x_residual.iter())
                .map(|(a, b)| a + b)
                .collect();

            // Pre-norm MLP block.
            let x_residual = x.clone();
            x = rms_norm(&x);
            x = linear(&x, &layer.mlp_fc1);
            x = x.iter().map(NodeRef::relu).collect();
            x = linear(&x, &layer.mlp_fc2);
            x = x
                .iter()
                .zip(x_residual.iter())
                .map(|(a, b)| a + b)
                .collect();
        }

        linear(&x, &self.weights.lm_head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rand::{rngs::StdRng, SeedableRng};

    fn tiny_model() -> Model {
        let config = Config {
            n_embed: 4,
            n_head: 2,
            n_layer: 2,
            block_size: 8,
            learning_rate: 0.05,
        };
        let docs = vec!["ab".to_string(), "ba".to_string()];
        Model::new(config, &docs, &mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn linear_output_is_row_count_of_w() {
        let x = vec![NodeRef::new(1.0), NodeRef::new(2.0)];
        let w = vec![
            vec![NodeRef::new(0.5), NodeRef::new(0.5)],
            vec![NodeRef::new(1.0), NodeRef::new(0.0)],
            vec![NodeRef::new(0.0), NodeRef::new(1.0)],
        ];
        let out = linear(&x, &w);
        assert_eq!(out.len(), 3);
        assert!((out[0].data() - 1.5).abs() < 1e-10);
        assert!((out[1].data() - 1.0).abs() < 1e-10);
        assert!((out[2].data() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn softmax_sums_to_one() {
        let logits = vec![NodeRef::new(0.3), NodeRef::new(-1.2), NodeRef::new(2.5)];
        let probs = softmax(&logits);
        let sum: f64 = probs.iter().map(NodeRef::data).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let a = softmax(&[NodeRef::new(1.0), NodeRef::new(2.0), NodeRef::new(3.0)]);
        let b = softmax(&[NodeRef::new(101.0), NodeRef::new(102.0), NodeRef::new(103.0)]);
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert!((pa.data() - pb.data()).abs() < 1e-9);
        }
    }

    #[test]
    fn rms_norm_output_has_unit_mean_square() {
        let x = vec![NodeRef::new(3.0), NodeRef::new(-4.0), NodeRef::new(0.5)];
        let out = rms_norm(&x);
        let ms: f64 = out.iter().map(|o| o.data() * o.data()).sum::<f64>() / out.len() as f64;
        assert!((ms - 1.0).abs() < 1e-4, "mean square was {ms}");
    }

    #[test]
    fn rms_norm_is_differentiable() {
        let x = vec![NodeRef::new(1.0), NodeRef::new(2.0)];
        let out = rms_norm(&x);
        out[0].backward();
        assert!(x[0].grad().is_finite());
    }

    #[test]
    fn forward_returns_vocab_sized_logits() {
        let model = tiny_model();
        let mut cache = KvCache::new(model.config().n_layer);
        let logits = model.forward(model.vocab().control_id(), 0, &mut cache);
        assert_eq!(logits.len(), model.vocab().size());
    }

    #[test]
    fn cache_grows_by_one_per_step_in_every_layer() {
        let model = tiny_model();
        let mut cache = KvCache::new(model.config().n_layer);
        assert!(cache.is_empty());
        for pos in 0..3 {
            let _ = model.forward(0, pos, &mut cache);
            for layer in 0..model.config().n_layer {
                assert_eq!(cache.len(layer), pos + 1);
            }
        }
    }

    #[test]
    fn forward_loss_backpropagates_to_embeddings() {
        let model = tiny_model();
        let mut cache = KvCache::new(model.config().n_layer);
        let logits = model.forward(0, 0, &mut cache);
        let probs = softmax(&logits);
        let loss = -&probs[1].log();
        loss.backward();
        let touched = model
            .weights
            .wte[0]
            .iter()
            .any(|p| p.grad().abs() > 0.0);
        assert!(touched, "loss should reach the token embedding row");
    }
}
