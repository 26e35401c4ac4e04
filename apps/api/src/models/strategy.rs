use serde::{Deserialize, Serialize};

use super::research::{ProfessorAnalysisResult, ResearchResult};

/// Shown in place of a strategy that could not be generated.
pub const STRATEGY_FAILURE_PLACEHOLDER: &str = "전략을 생성하는 중 오류가 발생했습니다.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConcept {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub example: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub tip: String,
    /// Follow-up question; requested for the high tier only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
}

/// Anticipated questions by difficulty. Every tier is always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    #[serde(default)]
    pub high: Vec<InterviewQuestion>,
    #[serde(default)]
    pub medium: Vec<InterviewQuestion>,
    #[serde(default)]
    pub low: Vec<InterviewQuestion>,
}

impl QuestionSet {
    pub fn len(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategicPlan {
    #[serde(default)]
    pub core_strategy: String,
    #[serde(default)]
    pub core_concepts: Vec<CoreConcept>,
    #[serde(default)]
    pub questions: QuestionSet,
}

/// The assembled report. Built once every upstream stage has succeeded and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullReport {
    pub university: String,
    pub department: String,
    pub curriculum_analysis: ResearchResult,
    pub professor_analysis: ProfessorAnalysisResult,
    pub interview_trends: ResearchResult,
    pub strategy: StrategicPlan,
}
