//! Secondary passes applied to research prose: a formatting review and a
//! fact-check against the cited sources. Both fail soft and hand back their
//! input unchanged on any error.

use std::time::Duration;

use tracing::{info, warn};

use super::prompts::{FACT_CHECK_PROMPT, FACT_CHECK_SYSTEM, REVIEW_PROMPT, REVIEW_SYSTEM};
use super::sources::extract_sources;
use crate::llm_client::prompts::{fill, time_context};
use crate::llm_client::provider::GenerateOptions;
use crate::llm_client::LlmClient;
use crate::models::{ResearchResult, Source};

/// Content shorter than this is returned without a fact-check.
pub const FACT_CHECK_MIN_CHARS: usize = 50;

pub async fn review_content(llm: &LlmClient, model: &str, content: &str, context: &str) -> String {
    if content.trim().is_empty() {
        return content.to_string();
    }

    let prompt = fill(REVIEW_PROMPT, &[("context", context), ("content", content)]);
    let options = GenerateOptions::default().with_system(REVIEW_SYSTEM);

    match llm.generate_once(model, &prompt, &options, "Review").await {
        Ok(generation) if !generation.text.trim().is_empty() => generation.text,
        Ok(_) => content.to_string(),
        Err(e) => {
            warn!(context, error = %e, "review pass failed, keeping draft");
            content.to_string()
        }
    }
}

pub async fn fact_check_and_refine(
    llm: &LlmClient,
    model: &str,
    content: &str,
    context: &str,
    sources: &[Source],
) -> String {
    if content.chars().count() < FACT_CHECK_MIN_CHARS {
        return content.to_string();
    }

    let source_list = sources
        .iter()
        .map(|s| format!("- {}: {}", s.title, s.uri))
        .collect::<Vec<_>>()
        .join("\n");
    let time_context = time_context();
    let prompt = fill(
        FACT_CHECK_PROMPT,
        &[
            ("context", context),
            ("time_context", time_context.as_str()),
            ("sources", source_list.as_str()),
            ("content", content),
        ],
    );
    let options = GenerateOptions::default().with_system(FACT_CHECK_SYSTEM);

    match llm.generate_once(model, &prompt, &options, "FactCheck").await {
        Ok(generation) if !generation.text.trim().is_empty() => generation.text,
        Ok(_) => content.to_string(),
        Err(e) => {
            warn!(context, error = %e, "fact-check pass failed, keeping draft");
            content.to_string()
        }
    }
}

/// Grounded free-text research followed by the review and fact-check passes.
///
/// 1. Stream the prompt with web grounding through smart retry
/// 2. Collect de-duplicated citations
/// 3. Review formatting, then fact-check against the citations
///
/// A generation that fails after every retry degrades to
/// `ResearchResult::unavailable()`.
pub async fn grounded_research(
    llm: &LlmClient,
    model: &str,
    prompt: &str,
    stream_timeout: Option<Duration>,
    task_label: &str,
    fact_context: &str,
) -> ResearchResult {
    let generation = match llm
        .generate_with_smart_retry(model, prompt, &GenerateOptions::grounded(), stream_timeout, task_label)
        .await
    {
        Ok(g) => g,
        Err(e) => {
            warn!(task = task_label, error = %e, "research failed after retries");
            return ResearchResult::unavailable();
        }
    };

    let sources = extract_sources(generation.grounding.as_ref());
    info!(task = task_label, sources = sources.len(), "research draft received");

    let formatted = review_content(llm, model, &generation.text, task_label).await;
    let text = fact_check_and_refine(llm, model, &formatted, fact_context, &sources).await;

    ResearchResult { text, sources }
}
