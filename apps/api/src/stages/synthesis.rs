use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::prompts::{QUESTIONS_PROMPT, STRATEGY_PROMPT};
use super::{Institution, StageConfig};
use crate::llm_client::json::{object_list, parse_json_safe, str_field};
use crate::llm_client::prompts::{
    current_year_month, fill, time_context, truncate_chars, INJECTION_GUARD, JSON_ONLY_SYSTEM,
};
use crate::llm_client::provider::GenerateOptions;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::strategy::STRATEGY_FAILURE_PLACEHOLDER;
use crate::models::{CoreConcept, InterviewQuestion, Professor, QuestionSet, StrategicPlan};

pub const CURRICULUM_CONTEXT_CHARS: usize = 1500;
pub const TRENDS_CONTEXT_CHARS: usize = 1000;

/// Which half of the plan to generate. Both when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubTask {
    Strategy,
    Questions,
}

/// Research the plan is built from.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub curriculum: &'a str,
    pub trends: &'a str,
    pub professors: &'a [Professor],
}

/// Builds the strategic plan from gathered research.
///
/// Strategy and questions are independent JSON calls, each with its own
/// smart retry, run concurrently when both are requested. A half that fails
/// is defaulted; `Err` only when every requested half failed.
pub async fn synthesize(
    llm: &LlmClient,
    institution: &Institution,
    input: &SynthesisInput<'_>,
    sub_task: Option<SubTask>,
    config: &StageConfig,
) -> Result<StrategicPlan, LlmError> {
    let model = config.model_or(llm.default_model());
    let stream_timeout = config.stream_timeout();

    let (year, _) = current_year_month();
    let year = year.to_string();
    let time_context = time_context();
    let curriculum = truncate_chars(input.curriculum, CURRICULUM_CONTEXT_CHARS);
    let trends = truncate_chars(input.trends, TRENDS_CONTEXT_CHARS);
    let faculty = input
        .professors
        .iter()
        .map(|p| format!("{}: {}", p.name, p.research_tendency))
        .collect::<Vec<_>>()
        .join("\n");
    let values = [
        ("guard", INJECTION_GUARD),
        ("time_context", time_context.as_str()),
        ("year", year.as_str()),
        ("curriculum", curriculum.as_str()),
        ("trends", trends.as_str()),
        ("faculty", faculty.as_str()),
        ("uni", institution.university.as_str()),
        ("dept", institution.department.as_str()),
    ];

    let want_strategy = sub_task != Some(SubTask::Questions);
    let want_questions = sub_task != Some(SubTask::Strategy);

    let strategy_call = async {
        if !want_strategy {
            return None;
        }
        let prompt = fill(STRATEGY_PROMPT, &values);
        let options = GenerateOptions::default()
            .with_schema(strategy_schema())
            .with_system(JSON_ONLY_SYSTEM);
        Some(
            llm.generate_with_smart_retry(model, &prompt, &options, stream_timeout, "Synthesis Strategy")
                .await,
        )
    };
    let questions_call = async {
        if !want_questions {
            return None;
        }
        let prompt = fill(QUESTIONS_PROMPT, &values);
        let options = GenerateOptions::default()
            .with_schema(questions_schema())
            .with_system(JSON_ONLY_SYSTEM);
        Some(
            llm.generate_with_smart_retry(model, &prompt, &options, stream_timeout, "Synthesis Questions")
                .await,
        )
    };
    let (strategy, questions) = tokio::join!(strategy_call, questions_call);

    let mut plan = StrategicPlan::default();
    let mut last_error = None;
    let mut succeeded = 0;

    match strategy {
        Some(Ok(generation)) => {
            succeeded += 1;
            let (core_strategy, core_concepts) = coerce_strategy(&parse_json_safe(&generation.text));
            plan.core_strategy = core_strategy;
            plan.core_concepts = core_concepts;
        }
        Some(Err(e)) => {
            warn!(error = %e, "strategy sub-task failed");
            plan.core_strategy = STRATEGY_FAILURE_PLACEHOLDER.to_string();
            last_error = Some(e);
        }
        None => {}
    }

    match questions {
        Some(Ok(generation)) => {
            succeeded += 1;
            plan.questions = coerce_questions(&parse_json_safe(&generation.text));
        }
        Some(Err(e)) => {
            warn!(error = %e, "questions sub-task failed");
            last_error = Some(e);
        }
        None => {}
    }

    if succeeded == 0 {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    info!(
        concepts = plan.core_concepts.len(),
        questions = plan.questions.len(),
        ?sub_task,
        "synthesis complete"
    );
    Ok(plan)
}

fn coerce_strategy(obj: &Map<String, Value>) -> (String, Vec<CoreConcept>) {
    let core_strategy =
        str_field(obj, "coreStrategy").unwrap_or_else(|| STRATEGY_FAILURE_PLACEHOLDER.to_string());
    let concepts = object_list(obj, "coreConcepts")
        .into_iter()
        .map(|c| CoreConcept {
            keyword: str_field(c, "keyword").unwrap_or_default(),
            description: str_field(c, "description").unwrap_or_default(),
            example: str_field(c, "example").unwrap_or_default(),
        })
        .filter(|c| !c.keyword.is_empty())
        .collect();
    (core_strategy, concepts)
}

/// Accepts `{questions: {high, medium, low}}` or the tiers at top level.
fn coerce_questions(obj: &Map<String, Value>) -> QuestionSet {
    let tiers = obj.get("questions").and_then(Value::as_object).unwrap_or(obj);
    let tier = |key: &str| -> Vec<InterviewQuestion> {
        object_list(tiers, key)
            .into_iter()
            .filter_map(|q| {
                Some(InterviewQuestion {
                    question: str_field(q, "question")?,
                    intent: str_field(q, "intent").unwrap_or_default(),
                    tip: str_field(q, "tip").unwrap_or_default(),
                    follow_up: str_field(q, "followUp"),
                })
            })
            .collect()
    };
    QuestionSet {
        high: tier("high"),
        medium: tier("medium"),
        low: tier("low"),
    }
}

fn strategy_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "coreStrategy": { "type": "STRING" },
            "coreConcepts": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "keyword": { "type": "STRING", "description": "Short phrase (max 5 words). NO professor names." },
                        "description": { "type": "STRING" },
                        "example": { "type": "STRING" }
                    }
                }
            }
        },
        "required": ["coreStrategy", "coreConcepts"]
    })
}

fn questions_schema() -> Value {
    let question = |with_follow_up: bool| {
        let mut properties = json!({
            "question": { "type": "STRING" },
            "intent": { "type": "STRING" },
            "tip": { "type": "STRING" }
        });
        if with_follow_up {
            properties["followUp"] = json!({ "type": "STRING" });
        }
        json!({ "type": "ARRAY", "items": { "type": "OBJECT", "properties": properties } })
    };
    json!({
        "type": "OBJECT",
        "properties": {
            "questions": {
                "type": "OBJECT",
                "properties": {
                    "high": question(true),
                    "medium": question(false),
                    "low": question(false)
                }
            }
        },
        "required": ["questions"]
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm_client::testing::{Script, ScriptedProvider};
    use crate::llm_client::LlmSettings;

    const STRATEGY_JSON: &str = r#"{"coreStrategy": "기초 과목 중심으로 준비", "coreConcepts": [
        {"keyword": "자료구조", "description": "d", "example": "e"},
        {"keyword": "", "description": "dropped"}]}"#;
    const QUESTIONS_JSON: &str = r#"{"questions": {
        "high": [{"question": "Q1", "intent": "i", "tip": "t", "followUp": "F1"}],
        "medium": [{"question": "Q2", "intent": "i", "tip": "t"}],
        "low": [{"question": "Q3"}, {"intent": "no question"}]}}"#;

    fn input() -> SynthesisInput<'static> {
        SynthesisInput { curriculum: "커리큘럼", trends: "트렌드", professors: &[] }
    }

    fn responder(strategy: fn() -> Script, questions: fn() -> Script) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::responder(move |_, prompt| {
            if prompt.starts_with("Act as a top-tier transfer interview strategist") {
                strategy()
            } else {
                questions()
            }
        }))
    }

    fn fatal() -> Script {
        Script::Fail(LlmError::Api { status: 400, message: "bad".into() })
    }

    async fn run(provider: Arc<ScriptedProvider>, sub_task: Option<SubTask>) -> Result<StrategicPlan, LlmError> {
        let llm = LlmClient::new(provider, LlmSettings::new("flash", "pro"));
        let inst = Institution::sanitized("한국대학교", "컴퓨터공학과");
        synthesize(&llm, &inst, &input(), sub_task, &StageConfig::default()).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_halves_are_merged() {
        let provider = responder(|| Script::text(STRATEGY_JSON), || Script::text(QUESTIONS_JSON));
        let plan = run(provider.clone(), None).await.unwrap();

        assert_eq!(plan.core_strategy, "기초 과목 중심으로 준비");
        assert_eq!(plan.core_concepts.len(), 1);
        assert_eq!(plan.questions.high[0].follow_up.as_deref(), Some("F1"));
        assert_eq!(plan.questions.low.len(), 1);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_questions_leave_all_tiers_empty() {
        let provider = responder(|| Script::text(STRATEGY_JSON), fatal);
        let plan = run(provider, None).await.unwrap();

        assert_eq!(plan.core_strategy, "기초 과목 중심으로 준비");
        assert!(plan.questions.high.is_empty());
        assert!(plan.questions.medium.is_empty());
        assert!(plan.questions.low.is_empty());
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["questions"]["high"], serde_json::json!([]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_strategy_gets_placeholder() {
        let provider = responder(fatal, || Script::text(QUESTIONS_JSON));
        let plan = run(provider, None).await.unwrap();
        assert_eq!(plan.core_strategy, STRATEGY_FAILURE_PLACEHOLDER);
        assert!(plan.core_concepts.is_empty());
        assert_eq!(plan.questions.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_strategy_is_coerced() {
        let provider = responder(|| Script::text("죄송합니다, 생성할 수 없습니다."), || Script::text("{}"));
        let plan = run(provider, None).await.unwrap();
        assert_eq!(plan.core_strategy, STRATEGY_FAILURE_PLACEHOLDER);
        assert!(plan.core_concepts.is_empty());
        assert!(plan.questions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_propagates() {
        let provider = responder(fatal, fatal);
        assert!(run(provider, None).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_sub_task_only_calls_once() {
        let provider = responder(|| Script::text(STRATEGY_JSON), || Script::text(QUESTIONS_JSON));
        let plan = run(provider.clone(), Some(SubTask::Questions)).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(plan.core_strategy, "");
        assert_eq!(plan.questions.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_is_truncated() {
        let provider = responder(|| Script::text(STRATEGY_JSON), || Script::text(QUESTIONS_JSON));
        let llm = LlmClient::new(provider.clone(), LlmSettings::new("flash", "pro"));
        let inst = Institution::sanitized("한국대학교", "컴퓨터공학과");
        let long = "가".repeat(CURRICULUM_CONTEXT_CHARS + 10);
        let input = SynthesisInput { curriculum: &long, trends: "", professors: &[] };

        synthesize(&llm, &inst, &input, Some(SubTask::Strategy), &StageConfig::default())
            .await
            .unwrap();

        let prompt = &provider.calls()[0].prompt;
        assert!(prompt.contains(&"가".repeat(CURRICULUM_CONTEXT_CHARS)));
        assert!(!prompt.contains(&"가".repeat(CURRICULUM_CONTEXT_CHARS + 1)));
    }
}
