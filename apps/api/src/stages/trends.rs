use super::agents::grounded_research;
use super::prompts::TRENDS_PROMPT;
use super::{Institution, StageConfig};
use crate::llm_client::prompts::{current_year_month, fill, time_context, INJECTION_GUARD};
use crate::llm_client::LlmClient;
use crate::models::ResearchResult;

/// Sections 5-9 of the report: accepted / rejected cases and interview tips.
pub async fn research_trends(
    llm: &LlmClient,
    institution: &Institution,
    config: &StageConfig,
) -> ResearchResult {
    let (year, _) = current_year_month();
    let (year, next_year) = (year.to_string(), (year + 1).to_string());
    let time_context = time_context();
    let prompt = fill(
        TRENDS_PROMPT,
        &[
            ("guard", INJECTION_GUARD),
            ("time_context", time_context.as_str()),
            ("year", year.as_str()),
            ("next_year", next_year.as_str()),
            ("uni", institution.university.as_str()),
            ("dept", institution.department.as_str()),
        ],
    );

    grounded_research(
        llm,
        config.model_or(llm.default_model()),
        &prompt,
        config.stream_timeout(),
        "Interview Trends",
        "Interview Trends",
    )
    .await
}
