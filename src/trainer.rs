//! Teacher-forced training: per-example loss with backprop, and batched
//! optimizer steps with explicit gradient accumulation.

use std::fmt;

use rand::{rngs::StdRng, Rng};
use serde::Serialize;

use crate::autograd::NodeRef;
use crate::model::{softmax, KvCache, Model};
use crate::tokenizer::TokenizerError;

/// Snapshot of one optimizer step for the caller's diagnostics display:
/// the loss plus what the model saw, was asked to predict, and would have
/// predicted at the final position of the last example.
#[derive(Clone, Debug, Serialize)]
pub struct TrainSummary {
    /// Optimizer steps completed so far.
    pub step: usize,
    /// Loss (averaged; see [`train_batched_steps`]).
    pub loss: f64,
    /// Input character at the last position.
    pub context_char: String,
    /// Character the model was trained to predict there.
    pub target_char: String,
    /// Character the model assigned the highest probability.
    pub predicted_char: String,
    /// Probability assigned to the target character.
    pub target_prob: f64,
    /// Probability assigned to the predicted character.
    pub predicted_prob: f64,
}

/// Errors from the training loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainError {
    /// The document set is empty; nothing to sample.
    NoDocuments,

    /// The selected example had no usable positions after truncation.
    EmptySequence,

    /// A document contained a character outside the model's vocabulary.
    Tokenizer(TokenizerError),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainError::NoDocuments => write!(f, "training: no documents provided"),
            TrainError::EmptySequence => write!(f, "training: sequence has no usable positions"),
            TrainError::Tokenizer(e) => write!(f, "training: {e}"),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainError::Tokenizer(e) => Some(e),
            TrainError::NoDocuments | TrainError::EmptySequence => None,
        }
    }
}

impl From<TokenizerError> for TrainError {
    fn from(e: TokenizerError) -> Self {
        TrainError::Tokenizer(e)
    }
}

/// Runs one teacher-forced example: picks a document uniformly at random,
/// feeds the true token at every position, averages the per-position
/// cross-entropy `-log P[next]`, and backpropagates once.
///
/// Gradients are left accumulated on the parameters; the caller decides
/// when to scale and apply them. Does not update any parameter itself.
///
/// # Errors
///
/// [`TrainError::NoDocuments`] without documents, [`TrainError::Tokenizer`]
/// for out-of-vocabulary characters, [`TrainError::EmptySequence`] if
/// truncation leaves no position to train on.
pub fn train_one_example(
    model: &Model,
    docs: &[String],
    rng: &mut StdRng,
) -> Result<TrainSummary, TrainError> {
    if docs.is_empty() {
        return Err(TrainError::NoDocuments);
    }
    let doc = &docs[rng.random_range(0..docs.len())];
    let tokens = model.vocab().encode(doc)?;

    let n = (tokens.len() - 1).min(model.config().block_size);
    if n == 0 {
        return Err(TrainError::EmptySequence);
    }

    let mut cache = KvCache::new(model.config().n_layer);
    let mut losses = Vec::with_capacity(n);
    let mut context_char = String::new();
    let mut target_char = String::new();
    let mut predicted_char = String::new();
    let mut target_prob = 0.0;
    let mut predicted_prob = 0.0;

    for pos in 0..n {
        let logits = model.forward(tokens[pos], pos, &mut cache);
        let probs = softmax(&logits);
        losses.push(-&probs[tokens[pos + 1]].log());

        // Final-position diagnostics for the caller's display.
        if pos == n - 1 {
            let (best_idx, best_prob) = probs
                .iter()
                .enumerate()
                .map(|(i, p)| (i, p.data()))
                .fold((0, f64::NEG_INFINITY), |acc, cur| {
                    if cur.1 > acc.1 {
                        cur
                    } else {
                        acc
                    }
                });
            let vocab = model.vocab();
            context_char = vocab.label(tokens[pos]);
            target_char = vocab.label(tokens[pos + 1]);
            predicted_char = vocab.label(best_idx);
            target_prob = probs[tokens[pos + 1]].data();
            predicted_prob = best_prob;
        }
    }

    let mut total = NodeRef::new(0.0);
    for l in &losses {
        total = &total + l;
    }
    let avg_loss = &total / &NodeRef::new(n as f64);
    avg_loss.backward();

    Ok(TrainSummary {
        step: model.steps(),
        loss: avg_loss.data(),
        context_char,
        target_char,
        predicted_char,
        target_prob,
        predicted_prob,
    })
}

/// Runs `steps_per_call` optimizer steps (both arguments clamped to at
/// least 1). Each step zeroes all parameter gradients, accumulates
/// gradients over `batch_size` random examples, scales them by
/// `1/batch_size`, and applies one Adam update.
///
/// The returned summary carries the diagnostics of the last example of the
/// last step, with `step` set to the model's step counter and `loss` set to
/// the mean batch loss across all steps of this call.
///
/// # Errors
///
/// Propagates the first [`TrainError`] from any example.
pub fn train_batched_steps(
    model: &mut Model,
    docs: &[String],
    steps_per_call: usize,
    batch_size: usize,
    rng: &mut StdRng,
) -> Result<TrainSummary, TrainError> {
    let steps_per_call = steps_per_call.max(1);
    let batch_size = batch_size.max(1);

    let mut last: Option<TrainSummary> = None;
    let mut loss_across_steps = 0.0;

    for _ in 0..steps_per_call {
        // Gradient reset is owned here, not left to callers.
        model.zero_grads();

        let mut batch_loss = 0.0;
        for _ in 0..batch_size {
            let summary = train_one_example(model, docs, rng)?;
            batch_loss += summary.loss;
            last = Some(summary);
        }

        model.scale_grads(1.0 / batch_size as f64);
        model.update();
        loss_across_steps += batch_loss / batch_size as f64;
    }

    let mut summary = last.ok_or(TrainError::EmptySequence)?;
    summary.step = model.steps();
    summary.loss = loss_across_steps / steps_per_call as f64;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
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

    fn setup(docs: &[&str]) -> (Model, Vec<String>, StdRng) {
        let docs: Vec<String> = docs.iter().map(|s| s.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(13);
        let model = Model::new(tiny_config(), &docs, &mut rng);
        (model, docs, rng)
    }

    #[test]
    fn train_one_example_returns_finite_loss_and_diagnostics() {
        let (model, docs, mut rng) = setup(&["ab", "ba"]);
        let summary = train_one_example(&model, &docs, &mut rng).unwrap();
        assert!(summary.loss.is_finite());
        assert!(summary.loss > 0.0);
        assert!(!summary.context_char.is_empty());
        assert!(summary.target_prob >= 0.0 && summary.target_prob <= 1.0);
        assert!(summary.predicted_prob >= summary.target_prob - 1e-12);
    }

    #[test]
    fn train_one_example_populates_parameter_gradients() {
        let (model, docs, mut rng) = setup(&["ab"]);
        train_one_example(&model, &docs, &mut rng).unwrap();
        // The embedding rows of the fed tokens must receive gradient.
        let control_row = &model.weights.wte[model.vocab().control_id()];
        assert!(control_row.iter().any(|p| p.grad().abs() > 0.0));
    }

    #[test]
    fn train_one_example_without_docs_fails() {
        let (model, _, mut rng) = setup(&["ab"]);
        let result = train_one_example(&model, &[], &mut rng);
        assert_eq!(result.unwrap_err(), TrainError::NoDocuments);
    }

    #[test]
    fn train_one_example_unknown_char_fails() {
        let (model, _, mut rng) = setup(&["ab"]);
        let alien = vec!["xyz".to_string()];
        let result = train_one_example(&model, &alien, &mut rng);
        assert!(matches!(result, Err(TrainError::Tokenizer(_))));
    }

    #[test]
    fn batched_steps_advance_the_step_counter() {
        let (mut model, docs, mut rng) = setup(&["ab", "ba"]);
        let summary = train_batched_steps(&mut model, &docs, 3, 2, &mut rng).unwrap();
        assert_eq!(model.steps(), 3);
        assert_eq!(summary.step, 3);
        assert!(summary.loss.is_finite());
    }

    #[test]
    fn batched_steps_clamp_zero_arguments_to_one() {
        let (mut model, docs, mut rng) = setup(&["ab"]);
        let summary = train_batched_steps(&mut model, &docs, 0, 0, &mut rng).unwrap();
        assert_eq!(summary.step, 1);
    }

    #[test]
    fn batched_steps_leave_gradients_consumed() {
        let (mut model, docs, mut rng) = setup(&["ab", "ba"]);
        train_batched_steps(&mut model, &docs, 1, 2, &mut rng).unwrap();
        assert!(model.params.iter().all(|p| p.grad() == 0.0));
    }

    #[test]
    fn loss_trends_down_on_a_single_document() {
        // Statistical, not per-step: compare early vs late moving averages
        // over repeated calls on a one-document corpus.
        let (mut model, docs, mut rng) = setup(&["abab"]);
        let mut losses = Vec::new();
        for _ in 0..60 {
            let summary = train_batched_steps(&mut model, &docs, 1, 1, &mut rng).unwrap();
            losses.push(summary.loss);
        }
        let early: f64 = losses[..10].iter().sum::<f64>() / 10.0;
        let late: f64 = losses[losses.len() - 10..].iter().sum::<f64>() / 10.0;
        assert!(
            late < early,
            "loss should trend down: early {early:.4} late {late:.4}"
        );
    }

    #[test]
    fn summary_serializes_with_original_field_names() {
        let summary = TrainSummary {
            step: 3,
            loss: 1.25,
            context_char: "a".into(),
            target_char: "b".into(),
            predicted_char: "b".into(),
            target_prob: 0.5,
            predicted_prob: 0.5,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["step"], 3);
        assert_eq!(json["context_char"], "a");
        assert_eq!(json["predicted_prob"], 0.5);
    }
}
