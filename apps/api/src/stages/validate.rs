use serde_json::Value;
use tracing::{info, warn};

use super::prompts::VALIDATE_PROMPT;
use super::{Institution, StageConfig};
use crate::llm_client::json::parse_json_safe;
use crate::llm_client::prompts::fill;
use crate::llm_client::provider::GenerateOptions;
use crate::llm_client::LlmClient;
use crate::models::ValidationResult;

/// Checks that the institution exists and flags likely typos.
///
/// Never fails: any provider or parse error yields `ValidationResult::fail_open()`.
pub async fn validate_institution(
    llm: &LlmClient,
    institution: &Institution,
    config: &StageConfig,
) -> ValidationResult {
    let model = config.model_or(llm.default_model());
    let prompt = fill(
        VALIDATE_PROMPT,
        &[
            ("uni", institution.university.as_str()),
            ("dept", institution.department.as_str()),
        ],
    );

    let generation = match llm
        .generate_once(model, &prompt, &GenerateOptions::grounded(), "Validate")
        .await
    {
        Ok(g) => g,
        Err(e) => {
            warn!(error = %e, "validation call failed, failing open");
            return ValidationResult::fail_open();
        }
    };

    let parsed = parse_json_safe(&generation.text);
    match serde_json::from_value::<ValidationResult>(Value::Object(parsed)) {
        Ok(result) => {
            info!(
                university = %institution.university,
                is_valid = result.is_valid,
                is_typo = result.is_typo,
                "validation complete"
            );
            result
        }
        Err(e) => {
            warn!(error = %e, "validation answer unusable, failing open");
            ValidationResult::fail_open()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm_client::testing::{Script, ScriptedProvider};
    use crate::llm_client::{LlmError, LlmSettings};

    fn client(provider: Arc<ScriptedProvider>) -> LlmClient {
        LlmClient::new(provider, LlmSettings::new("flash", "pro"))
    }

    #[tokio::test]
    async fn test_typo_is_reported_with_correction() {
        let provider = Arc::new(ScriptedProvider::sequence(vec![Script::text(
            "```json\n{\"isValid\": true, \"isTypo\": true, \"correctedUniversity\": \"서울대학교\", \
             \"correctedDepartment\": null, \"message\": \"오타가 있습니다.\"}\n```",
        )]));
        let inst = Institution::sanitized("서을대학교", "컴퓨터공학부");

        let result = validate_institution(&client(provider.clone()), &inst, &StageConfig::default()).await;

        assert!(result.needs_confirmation());
        assert_eq!(result.corrected_university.as_deref(), Some("서울대학교"));
        assert!(provider.calls()[0].prompt.contains("서을대학교"));
        assert!(!provider.calls()[0].streamed);
    }

    #[tokio::test]
    async fn test_provider_failure_fails_open() {
        let provider = Arc::new(ScriptedProvider::sequence(vec![Script::Fail(LlmError::Api {
            status: 503,
            message: "unavailable".into(),
        })]));
        let inst = Institution::sanitized("한국대학교", "컴퓨터공학과");
        let result = validate_institution(&client(provider), &inst, &StageConfig::default()).await;
        assert_eq!(result, ValidationResult::fail_open());
    }

    #[tokio::test]
    async fn test_garbage_answer_fails_open() {
        let provider = Arc::new(ScriptedProvider::sequence(vec![Script::text("I am not sure.")]));
        let inst = Institution::sanitized("한국대학교", "컴퓨터공학과");
        let result = validate_institution(&client(provider), &inst, &StageConfig::default()).await;
        assert!(result.is_valid);
    }
}
