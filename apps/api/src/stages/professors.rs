use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::agents::fact_check_and_refine;
use super::prompts::{MAJOR_KNOWLEDGE_PROMPT, PROFESSOR_DETAIL_PROMPT, PROFESSOR_LIST_PROMPT};
use super::sources::{extract_sources, merge_sources};
use super::{Institution, StageConfig};
use crate::llm_client::json::{parse_json_safe, str_field, string_list};
use crate::llm_client::prompts::{fill, time_context, INJECTION_GUARD};
use crate::llm_client::provider::GenerateOptions;
use crate::llm_client::LlmClient;
use crate::models::{Professor, ProfessorAnalysisResult, Source};

/// At most this many professors get a detail query.
pub const MAX_PROFESSORS: usize = 5;
/// Default spacing between consecutive detail queries.
pub const PROFESSOR_STAGGER: Duration = Duration::from_millis(500);

const TENDENCY_PLACEHOLDER: &str = "연구 경향 정보를 찾을 수 없습니다.";
const MAJOR_KNOWLEDGE_PLACEHOLDER: &str = "전공 핵심 지식 분석을 가져오지 못했습니다.";

/// Section 3-4 of the report.
///
/// 1. Discover up to five faculty names with a grounded list query
/// 2. Query each name's details, staggered by `delay` per position
/// 3. Drop results lacking both a lab and a research tendency
/// 4. Write the discipline-wide "major knowledge" narrative from the accepted set
///
/// An empty name list short-circuits to `ProfessorAnalysisResult::empty()`.
pub async fn research_professors(
    llm: &LlmClient,
    institution: &Institution,
    config: &StageConfig,
) -> ProfessorAnalysisResult {
    let model = config.model_or(llm.default_model());
    let stream_timeout = config.stream_timeout();
    let time_context = time_context();

    let names = discover_names(llm, model, institution, &time_context, stream_timeout).await;
    if names.is_empty() {
        info!(university = %institution.university, "no professors discovered");
        return ProfessorAnalysisResult::empty();
    }

    let delay = config.delay_or(PROFESSOR_STAGGER);
    let lookups = names.iter().enumerate().map(|(i, name)| {
        let time_context = time_context.as_str();
        async move {
            // Staggered start; completion order is not constrained.
            tokio::time::sleep(delay * i as u32).await;
            lookup_professor(llm, model, institution, name, time_context, stream_timeout).await
        }
    });

    let mut sources: Vec<Source> = Vec::new();
    let mut professors = Vec::new();
    for (professor, found) in join_all(lookups).await.into_iter().flatten() {
        merge_sources(&mut sources, found);
        professors.push(professor);
    }
    info!(
        requested = names.len(),
        accepted = professors.len(),
        "professor details collected"
    );

    let (narrative, macro_sources) =
        major_knowledge(llm, model, institution, &professors, &time_context, stream_timeout).await;
    merge_sources(&mut sources, macro_sources);

    ProfessorAnalysisResult {
        professors,
        major_knowledge_analysis: narrative,
        sources,
    }
}

async fn discover_names(
    llm: &LlmClient,
    model: &str,
    institution: &Institution,
    time_context: &str,
    stream_timeout: Option<Duration>,
) -> Vec<String> {
    let prompt = fill(
        PROFESSOR_LIST_PROMPT,
        &[
            ("guard", INJECTION_GUARD),
            ("time_context", time_context),
            ("uni", institution.university.as_str()),
            ("dept", institution.department.as_str()),
        ],
    );

    match llm
        .generate_with_smart_retry(model, &prompt, &GenerateOptions::grounded(), stream_timeout, "Professor List")
        .await
    {
        Ok(generation) => {
            let mut names = string_list(&parse_json_safe(&generation.text), "names");
            names.truncate(MAX_PROFESSORS);
            names
        }
        Err(e) => {
            warn!(error = %e, "professor list query failed");
            Vec::new()
        }
    }
}

async fn lookup_professor(
    llm: &LlmClient,
    model: &str,
    institution: &Institution,
    name: &str,
    time_context: &str,
    stream_timeout: Option<Duration>,
) -> Option<(Professor, Vec<Source>)> {
    let prompt = fill(
        PROFESSOR_DETAIL_PROMPT,
        &[
            ("guard", INJECTION_GUARD),
            ("time_context", time_context),
            ("name", name),
            ("uni", institution.university.as_str()),
            ("dept", institution.department.as_str()),
        ],
    );
    let label = format!("Professor Detail ({name})");

    let generation = match llm
        .generate_with_smart_retry(model, &prompt, &GenerateOptions::grounded(), stream_timeout, &label)
        .await
    {
        Ok(g) => g,
        Err(e) => {
            warn!(professor = name, error = %e, "professor detail query failed");
            return None;
        }
    };

    let professor = professor_from_json(name, &parse_json_safe(&generation.text))?;
    Some((professor, extract_sources(generation.grounding.as_ref())))
}

/// Builds a professor record, or `None` when neither a lab nor a research
/// tendency was found.
fn professor_from_json(requested_name: &str, obj: &Map<String, Value>) -> Option<Professor> {
    let lab = str_field(obj, "lab");
    let tendency = str_field(obj, "researchTendency");
    if lab.is_none() && tendency.is_none() {
        return None;
    }

    Some(Professor {
        name: str_field(obj, "name").unwrap_or_else(|| requested_name.to_string()),
        lab,
        contact: str_field(obj, "contact"),
        major_papers: string_list(obj, "majorPapers"),
        research_tendency: tendency.unwrap_or_else(|| TENDENCY_PLACEHOLDER.to_string()),
        details: str_field(obj, "details"),
    })
}

async fn major_knowledge(
    llm: &LlmClient,
    model: &str,
    institution: &Institution,
    professors: &[Professor],
    time_context: &str,
    stream_timeout: Option<Duration>,
) -> (String, Vec<Source>) {
    let faculty = professors
        .iter()
        .map(|p| format!("- {}: {}", p.name, p.research_tendency))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = fill(
        MAJOR_KNOWLEDGE_PROMPT,
        &[
            ("guard", INJECTION_GUARD),
            ("time_context", time_context),
            ("faculty", faculty.as_str()),
            ("uni", institution.university.as_str()),
            ("dept", institution.department.as_str()),
        ],
    );

    let generation = match llm
        .generate_with_smart_retry(model, &prompt, &GenerateOptions::grounded(), stream_timeout, "Macro Analysis")
        .await
    {
        Ok(g) => g,
        Err(e) => {
            warn!(error = %e, "major knowledge analysis failed");
            return (MAJOR_KNOWLEDGE_PLACEHOLDER.to_string(), Vec::new());
        }
    };

    let sources = extract_sources(generation.grounding.as_ref());
    let context = format!("General {} Knowledge", institution.department);
    let verified = fact_check_and_refine(llm, model, &generation.text, &context, &sources).await;
    (verified, sources)
}
