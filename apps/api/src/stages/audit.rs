use serde_json::{Map, Value};
use tracing::{info, warn};

use super::prompts::AUDIT_PROMPT;
use super::{Institution, StageConfig};
use crate::llm_client::json::{parse_json_safe, str_field, string_list};
use crate::llm_client::prompts::{fill, time_context, truncate_chars, INJECTION_GUARD, JSON_ONLY_SYSTEM};
use crate::llm_client::provider::GenerateOptions;
use crate::llm_client::LlmClient;
use crate::models::{AuditReport, AuditStatus};

/// Each audited blob is cut to this many characters.
pub const AUDIT_BLOB_CHARS: usize = 3000;

/// Research to audit, as the caller sent it.
#[derive(Debug, Clone, Copy)]
pub struct AuditInput<'a> {
    pub curriculum: &'a Value,
    pub professors: &'a Value,
    pub trends: &'a Value,
}

/// Scores gathered research. Advisory only: never fails, any error yields
/// `AuditReport::fail_open()`.
pub async fn audit_research(
    llm: &LlmClient,
    institution: &Institution,
    input: &AuditInput<'_>,
    config: &StageConfig,
) -> AuditReport {
    let model = config.model_or(llm.default_model());
    let time_context = time_context();
    let [curriculum, professors, trends] =
        [input.curriculum, input.professors, input.trends].map(blob);
    let prompt = fill(
        AUDIT_PROMPT,
        &[
            ("guard", INJECTION_GUARD),
            ("time_context", time_context.as_str()),
            ("curriculum", curriculum.as_str()),
            ("professors", professors.as_str()),
            ("trends", trends.as_str()),
            ("uni", institution.university.as_str()),
            ("dept", institution.department.as_str()),
        ],
    );
    let options = GenerateOptions::json().with_system(JSON_ONLY_SYSTEM);

    match llm
        .generate_with_smart_retry(model, &prompt, &options, config.stream_timeout(), "Audit Analysis")
        .await
    {
        Ok(generation) => {
            let report = coerce_report(&parse_json_safe(&generation.text));
            info!(score = report.score, status = ?report.status, issues = report.issues.len(), "audit complete");
            report
        }
        Err(e) => {
            warn!(error = %e, "audit failed, failing open");
            AuditReport::fail_open()
        }
    }
}

fn blob(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate_chars(&text, AUDIT_BLOB_CHARS)
}

fn coerce_report(obj: &Map<String, Value>) -> AuditReport {
    let score = obj
        .get("score")
        .and_then(Value::as_f64)
        .map(|s| s.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(0);
    let status = match str_field(obj, "status").map(|s| s.to_ascii_uppercase()).as_deref() {
        Some("PASS") => AuditStatus::Pass,
        Some("FAIL") => AuditStatus::Fail,
        _ => AuditStatus::Warning,
    };

    AuditReport {
        score,
        status,
        issues: string_list(obj, "issues"),
        feedback: str_field(obj, "feedback").unwrap_or_default(),
    }
}
