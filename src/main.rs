//! Demo run: load a corpus, train a session, print samples and one trace.
//!
//! Everything is driven by `CHARGPT_*` environment variables; see the
//! config module for keys and defaults.

use chargpt::config::from_env;
use chargpt::sampler::GenerateOptions;
use chargpt::{load_docs, Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, settings) = from_env()?;
    let docs = load_docs(&settings.input_path)?;
    println!("num docs: {}", docs.len());

    let session = Session::with_seed(settings.seed);
    let init = session.initialize(docs, config)?;
    println!("num params: {}", init.param_count);

    let log_every = settings.loss_log_every.max(1);
    for call in 0..settings.train_calls {
        let summary = session.train_step(
            Some(settings.steps_per_call),
            Some(settings.batch_size),
        )?;
        if call == 0 || (call + 1) % log_every == 0 {
            println!(
                "call {:4} / {:4} | step {:5} | loss {:.4} | '{}' -> '{}' (predicted '{}' at {:.3})",
                call + 1,
                settings.train_calls,
                summary.step,
                summary.loss,
                summary.context_char,
                summary.target_char,
                summary.predicted_char,
                summary.predicted_prob,
            );
        }
    }

    let opts = GenerateOptions {
        temperature: settings.temperature,
        top_k: settings.top_k,
        min_len: settings.min_len,
    };

    println!("\n--- samples ---");
    for i in 0..settings.sample_size {
        let text = session.generate(opts)?;
        println!("sample {:2}: {}", i + 1, text);
    }

    println!("\n--- one traced sample ---");
    let trace = session.generate_with_trace(opts)?;
    println!("text: {:?} (stop: {})", trace.text, trace.stop_reason);
    for step in &trace.steps {
        println!(
            "pos {:2} | chose '{}' (p={:.4}, rank {}) | u={:.4} in [{:.4}, {:.4})",
            step.position,
            step.chosen_char,
            step.chosen_prob,
            step.chosen_rank,
            step.random_u,
            step.cum_before,
            step.cum_after,
        );
    }

    Ok(())
}
