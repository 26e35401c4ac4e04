use super::agents::grounded_research;
use super::prompts::CURRICULUM_PROMPT;
use super::{Institution, StageConfig};
use crate::llm_client::prompts::{current_year_month, fill, time_context, INJECTION_GUARD};
use crate::llm_client::LlmClient;
use crate::models::ResearchResult;

/// Sections 1-2 of the report: core curriculum and education trends.
pub async fn research_curriculum(
    llm: &LlmClient,
    institution: &Institution,
    config: &StageConfig,
) -> ResearchResult {
    let (year, _) = current_year_month();
    let (year, next_year) = (year.to_string(), (year + 1).to_string());
    let time_context = time_context();
    let prompt = fill(
        CURRICULUM_PROMPT,
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
        "Curriculum Analysis",
        &format!("{} {} Curriculum", institution.university, institution.department),
    )
    .await
}
