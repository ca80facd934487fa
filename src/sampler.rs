//! Sampling and explainability: temperature/top-k probability shaping,
//! inverse-CDF token draws, and a per-step trace of why each token won.
//!
//! Sampling works on plain `f64` probabilities (no gradient tracking); only
//! the forward pass itself runs on autograd nodes.

use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use crate::config::constants::{DEFAULT_MIN_LEN, DEFAULT_TEMPERATURE, DEFAULT_TOP_K, TRACE_TOP_K};
use crate::model::{KvCache, Model};
use crate::tokenizer::Vocab;

/// Stop reason when the model drew the control token.
pub const STOP_CONTROL_TOKEN: &str = "control token selected";
/// Stop reason when generation used every position of the block.
pub const STOP_LENGTH_LIMIT: &str = "length limit reached";

/// Generation knobs. Out-of-range values are repaired by [`sanitize`]
/// rather than rejected.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Softmax temperature; non-positive values fall back to 0.7.
    pub temperature: f64,
    /// Keep only the k most probable tokens (0 disables the filter).
    pub top_k: usize,
    /// Suppress the end token until this many characters are emitted.
    pub min_len: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            min_len: DEFAULT_MIN_LEN,
        }
    }
}

/// Applies defaults and clamps: non-positive or non-finite temperature
/// becomes 0.7, top-k is capped at the vocabulary size.
#[must_use]
pub fn sanitize(mut opts: GenerateOptions, vocab_size: usize) -> GenerateOptions {
    if !(opts.temperature > 0.0 && opts.temperature.is_finite()) {
        opts.temperature = DEFAULT_TEMPERATURE;
    }
    opts.top_k = opts.top_k.min(vocab_size);
    opts
}

/// Result of one inverse-CDF draw: the token, the uniform draw, and the
/// cumulative interval that captured it.
#[derive(Clone, Copy, Debug)]
pub struct Draw {
    /// Selected token id.
    pub token_id: usize,
    /// The uniform draw in `[0, 1)`.
    pub u: f64,
    /// Cumulative mass before the selected token.
    pub cum_before: f64,
    /// Cumulative mass including the selected token.
    pub cum_after: f64,
    /// Probability of the selected token.
    pub prob: f64,
}

/// Converts logits into the final sampling distribution.
///
/// Divides by temperature, applies a numerically stable softmax over the
/// raw values, zeroes everything outside the top-k (when `top_k > 0`),
/// zeroes the control token while `suppress_end` holds, and renormalizes.
/// If filtering removed all mass, falls back to a uniform distribution
/// (still excluding the control token when suppressed).
///
/// Returns the temperature-scaled logits alongside the probabilities; the
/// trace reports both.
#[must_use]
pub fn to_prob_vector(
    logit_values: &[f64],
    opts: &GenerateOptions,
    control_id: usize,
    suppress_end: bool,
) -> (Vec<f64>, Vec<f64>) {
    let raw: Vec<f64> = logit_values.iter().map(|l| l / opts.temperature).collect();
    let max_logit = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut probs: Vec<f64> = raw.iter().map(|r| (r - max_logit).exp()).collect();
    let sum_exp: f64 = probs.iter().sum();
    if sum_exp > 0.0 {
        for p in &mut probs {
            *p /= sum_exp;
        }
    }

    if opts.top_k > 0 && opts.top_k < probs.len() {
        let mut indices: Vec<usize> = (0..probs.len()).collect();
        indices.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
        for &idx in &indices[opts.top_k..] {
            probs[idx] = 0.0;
        }
    }

    if suppress_end && control_id < probs.len() {
        probs[control_id] = 0.0;
    }

    let sum: f64 = probs.iter().sum();
    if sum > 0.0 {
        for p in &mut probs {
            *p /= sum;
        }
    } else {
        // Degenerate case: all retained mass was filtered away. Hand back a
        // uniform distribution, re-suppressing the control token if needed.
        let uniform = 1.0 / probs.len() as f64;
        probs.fill(uniform);
        if suppress_end && probs.len() > 1 && control_id < probs.len() {
            let rest = 1.0 / (probs.len() - 1) as f64;
            probs.fill(rest);
            probs[control_id] = 0.0;
        }
    }

    (raw, probs)
}

/// Inverse-CDF selection: walks `probs` in vocabulary-index order
/// accumulating mass and returns the first index whose cumulative sum
/// exceeds `u`. If floating-point rounding exhausts the vector without a
/// hit, returns `fallback` with the final interval.
#[must_use]
pub fn sample_from_prob_vector(probs: &[f64], fallback: usize, u: f64) -> Draw {
    let mut cumulative = 0.0;
    for (idx, &p) in probs.iter().enumerate() {
        let before = cumulative;
        cumulative += p;
        if u < cumulative {
            return Draw {
                token_id: idx,
                u,
                cum_before: before,
                cum_after: cumulative,
                prob: p,
            };
        }
    }
    Draw {
        token_id: fallback,
        u,
        cum_before: 0.0,
        cum_after: cumulative,
        prob: 0.0,
    }
}

/// One candidate row in a trace step.
#[derive(Clone, Debug, Serialize)]
pub struct TraceCandidate {
    /// Display label (`<END>` for the control token).
    #[serde(rename = "char")]
    pub label: String,
    /// Token id.
    pub token_id: usize,
    /// Temperature-scaled logit.
    pub logit: f64,
    /// Final sampling probability.
    pub prob: f64,
}

/// Explanation of one generation step.
#[derive(Clone, Debug, Serialize)]
pub struct TraceStep {
    /// Position in the generated sequence.
    pub position: usize,
    /// Text generated before this step.
    pub context: String,
    /// The highest-probability candidates, descending.
    pub top_k: Vec<TraceCandidate>,
    /// The uniform draw.
    pub random_u: f64,
    /// Label of the chosen token.
    pub chosen_char: String,
    /// Probability of the chosen token.
    pub chosen_prob: f64,
    /// 1-based rank of the chosen token among `top_k`, or the vocabulary
    /// size when it fell outside.
    pub chosen_rank: usize,
    /// Cumulative mass before the chosen token.
    pub cum_before: f64,
    /// Cumulative mass including the chosen token.
    pub cum_after: f64,
    /// Natural-language justification referencing the interval and draw.
    pub reason: String,
}

/// A traced generation: the text plus the step-by-step account of it.
#[derive(Clone, Debug, Serialize)]
pub struct Trace {
    /// Generated text.
    pub text: String,
    /// One entry per sampled position.
    pub steps: Vec<TraceStep>,
    /// Why generation stopped.
    pub stop_reason: String,
}

/// The `k` highest-probability tokens, descending, labeled for display.
fn top_candidates(raw: &[f64], probs: &[f64], vocab: &Vocab, k: usize) -> Vec<TraceCandidate> {
    let mut indices: Vec<usize> = (0..probs.len()).collect();
    indices.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    indices.truncate(k);
    indices
        .into_iter()
        .map(|idx| TraceCandidate {
            label: vocab.label(idx),
            token_id: idx,
            logit: raw[idx],
            prob: probs[idx],
        })
        .collect()
}

fn step_reason(draw: &Draw, vocab: &Vocab, top_k: &[TraceCandidate]) -> String {
    let mut reason = format!(
        "Chosen '{}' because draw {:.4} fell inside cumulative interval [{:.4}, {:.4}) in vocabulary index order.",
        vocab.label(draw.token_id),
        draw.u,
        draw.cum_before,
        draw.cum_after,
    );
    if let Some(best) = top_k.first() {
        if best.token_id != draw.token_id {
            reason.push_str(&format!(
                " Highest-probability option was '{}' at {:.4}, but stochastic sampling can still pick lower-ranked valid options.",
                best.label, best.prob,
            ));
        }
    }
    reason
}

/// Samples one text: starts from the control token and draws until the
/// control token reappears or the block is exhausted.
#[must_use]
pub fn generate(model: &Model, opts: GenerateOptions, rng: &mut StdRng) -> String {
    let opts = sanitize(opts, model.vocab().size());
    let control = model.vocab().control_id();
    let mut cache = KvCache::new(model.config().n_layer);
    let mut token_id = control;
    let mut sample: Vec<char> = Vec::new();

    for pos in 0..model.config().block_size {
        let logits = model.forward(token_id, pos, &mut cache);
        let logit_values: Vec<f64> = logits.iter().map(|l| l.data()).collect();
        let suppress_end = sample.len() < opts.min_len;
        let (_, probs) = to_prob_vector(&logit_values, &opts, control, suppress_end);
        let draw = sample_from_prob_vector(&probs, control, rng.random());

        if draw.token_id == control {
            break;
        }
        sample.push(model.vocab().chars()[draw.token_id]);
        token_id = draw.token_id;
    }

    sample.into_iter().collect()
}

/// Like [`generate`], but records every step: candidates, the draw, the
/// captured interval, and a human-readable justification.
#[must_use]
pub fn generate_with_trace(model: &Model, opts: GenerateOptions, rng: &mut StdRng) -> Trace {
    let opts = sanitize(opts, model.vocab().size());
    let vocab = model.vocab();
    let control = vocab.control_id();
    let mut cache = KvCache::new(model.config().n_layer);
    let mut token_id = control;
    let mut sample: Vec<char> = Vec::new();
    let mut steps = Vec::new();
    let mut stop_reason = STOP_LENGTH_LIMIT;

    for pos in 0..model.config().block_size {
        let logits = model.forward(token_id, pos, &mut cache);
        let logit_values: Vec<f64> = logits.iter().map(|l| l.data()).collect();
        let suppress_end = sample.len() < opts.min_len;
        let (raw, probs) = to_prob_vector(&logit_values, &opts, control, suppress_end);
        let top_k = top_candidates(&raw, &probs, vocab, TRACE_TOP_K);

        let draw = sample_from_prob_vector(&probs, control, rng.random());
        let chosen_rank = top_k
            .iter()
            .position(|c| c.token_id == draw.token_id)
            .map_or(probs.len(), |r| r + 1);

        steps.push(TraceStep {
            position: pos,
            context: sample.iter().collect(),
            reason: step_reason(&draw, vocab, &top_k),
            top_k,
            random_u: draw.u,
            chosen_char: vocab.label(draw.token_id),
            chosen_prob: draw.prob,
            chosen_rank,
            cum_before: draw.cum_before,
            cum_after: draw.cum_after,
        });

        if draw.token_id == control {
            stop_reason = STOP_CONTROL_TOKEN;
            break;
        }
        sample.push(vocab.chars()[draw.token_id]);
        token_id = draw.token_id;
    }

    Trace {
        text: sample.into_iter().collect(),
        steps,
        stop_reason: stop_reason.to_string(),
    }
}
