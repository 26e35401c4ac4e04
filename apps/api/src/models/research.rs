use serde::{Deserialize, Serialize};

/// A grounding citation attached by the provider's web-search tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

/// Output of a free-text research stage (curriculum, trends).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl ResearchResult {
    /// Placeholder returned when research could not be produced.
    pub fn unavailable() -> Self {
        Self {
            text: "분석 데이터를 가져오는 데 실패했습니다.".to_string(),
            sources: Vec::new(),
        }
    }
}

/// One faculty member.
///
/// A professor is only kept when at least one of `lab` / `research_tendency`
/// was found; `research_tendency` is always non-empty on kept records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Professor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default)]
    pub major_papers: Vec<String>,
    #[serde(default)]
    pub research_tendency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorAnalysisResult {
    #[serde(default)]
    pub professors: Vec<Professor>,
    #[serde(default)]
    pub major_knowledge_analysis: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl ProfessorAnalysisResult {
    pub fn empty() -> Self {
        Self {
            professors: Vec::new(),
            major_knowledge_analysis: "정보를 찾을 수 없습니다.".to_string(),
            sources: Vec::new(),
        }
    }
}
