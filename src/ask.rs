//! `docchat ask`: answer a question from the indexed documents.

use anyhow::{bail, Result};

use docchat_core::models::Answer;

use crate::config::Config;
use crate::services::Services;

/// Answer `question`, overriding the configured `top_k` and relevance
/// threshold when given.
///
/// Always prints an answer; failures inside retrieval or generation are
/// reported in the answer text rather than as an error exit.
pub async fn run_ask(
    config: &Config,
    question: &str,
    k: Option<usize>,
    threshold: Option<f32>,
    json: bool,
) -> Result<()> {
    if k == Some(0) {
        bail!("-k must be at least 1");
    }
    if let Some(t) = threshold {
        if !(0.0..=2.0).contains(&t) {
            bail!("--threshold must be in [0.0, 2.0], got {}", t);
        }
    }

    let services = Services::build(config).await?;
    let params = services.orchestrator.params();
    let answer = services
        .orchestrator
        .ask(
            question,
            k.unwrap_or(params.top_k),
            threshold.unwrap_or(params.relevance_threshold),
        )
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", render_answer(&answer));
    }

    services.close().await;
    Ok(())
}

fn render_answer(answer: &Answer) -> String {
    let mut out = format!("{}\n", answer.answer);
    if answer.sources.is_empty() {
        return out;
    }

    out.push('\n');
    if answer.low_confidence {
        out.push_str("Sources (low confidence):\n");
    } else {
        out.push_str("Sources:\n");
    }
    for source in &answer.sources {
        out.push_str(&format!(
            "  [{}] {} ({:.1}% relevant)\n      {}\n",
            source.index, source.doc_name, source.relevance, source.snippet
        ));
    }
    out
}
