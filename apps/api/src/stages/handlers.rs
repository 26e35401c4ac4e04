//! Axum handlers for the single action endpoint.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::audit::{audit_research, AuditInput};
use super::curriculum::research_curriculum;
use super::professors::research_professors;
use super::synthesis::{synthesize, SubTask, SynthesisInput};
use super::trends::research_trends;
use super::validate::validate_institution;
use super::{Institution, StageConfig};
use crate::errors::AppError;
use crate::models::{
    AuditReport, Professor, ProfessorAnalysisResult, ResearchResult, StrategicPlan, ValidationResult,
};
use crate::rate_limit::retry_after_secs;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// `{action, payload}` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "lowercase")]
pub enum ActionRequest {
    Validate(InstitutionPayload),
    Curriculum(InstitutionPayload),
    Professors(InstitutionPayload),
    Trends(InstitutionPayload),
    Synthesis(SynthesisPayload),
    Audit(AuditPayload),
}

impl ActionRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ActionRequest::Validate(_) => "validate",
            ActionRequest::Curriculum(_) => "curriculum",
            ActionRequest::Professors(_) => "professors",
            ActionRequest::Trends(_) => "trends",
            ActionRequest::Synthesis(_) => "synthesis",
            ActionRequest::Audit(_) => "audit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionPayload {
    pub uni: String,
    pub dept: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<StageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisPayload {
    pub uni: String,
    pub dept: String,
    #[serde(default)]
    pub curriculum: String,
    #[serde(default)]
    pub professors: Vec<Professor>,
    #[serde(default)]
    pub trends: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_task: Option<SubTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<StageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPayload {
    pub uni: String,
    pub dept: String,
    #[serde(default)]
    pub curriculum: Value,
    #[serde(default)]
    pub professors: Value,
    #[serde(default)]
    pub trends: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<StageConfig>,
}

/// Action-shaped success body.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResponse {
    Validation(ValidationResult),
    Research(ResearchResult),
    Professors(ProfessorAnalysisResult),
    Strategy(StrategicPlan),
    Audit(AuditReport),
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/gemini
///
/// Checks, in order: service enabled (503), caller quota (429), well-formed
/// action (400). Then dispatches to the stage handler.
pub async fn handle_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<ActionResponse>, AppError> {
    if !state.config.api_enabled {
        return Err(AppError::ServiceDisabled);
    }

    let client = client_key(&headers, peer.map(|ConnectInfo(addr)| addr));
    let verdict = match state.rate_limiter.lock() {
        Ok(mut limiter) => limiter.check(&client),
        // A poisoned window only loses counts; keep serving.
        Err(poisoned) => poisoned.into_inner().check(&client),
    };
    if let Err(wait) = verdict {
        warn!(client = %client, "rate limit exceeded");
        return Err(AppError::RateLimited {
            retry_after_secs: retry_after_secs(wait),
        });
    }

    let request: ActionRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "rejected malformed action request");
        AppError::Validation("Invalid action".to_string())
    })?;
    info!(action = request.name(), client = %client, "dispatching action");

    dispatch(&state, request).await.map(Json)
}

/// OPTIONS /api/gemini
pub async fn handle_preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn dispatch(state: &AppState, request: ActionRequest) -> Result<ActionResponse, AppError> {
    let llm = &state.llm;
    let response = match request {
        ActionRequest::Validate(p) => {
            let inst = Institution::sanitized(&p.uni, &p.dept);
            ActionResponse::Validation(validate_institution(llm, &inst, &config_of(&p.config)).await)
        }
        ActionRequest::Curriculum(p) => {
            let inst = Institution::sanitized(&p.uni, &p.dept);
            ActionResponse::Research(research_curriculum(llm, &inst, &config_of(&p.config)).await)
        }
        ActionRequest::Professors(p) => {
            let inst = Institution::sanitized(&p.uni, &p.dept);
            ActionResponse::Professors(research_professors(llm, &inst, &config_of(&p.config)).await)
        }
        ActionRequest::Trends(p) => {
            let inst = Institution::sanitized(&p.uni, &p.dept);
            ActionResponse::Research(research_trends(llm, &inst, &config_of(&p.config)).await)
        }
        ActionRequest::Synthesis(p) => {
            let inst = Institution::sanitized(&p.uni, &p.dept);
            let input = SynthesisInput {
                curriculum: &p.curriculum,
                trends: &p.trends,
                professors: &p.professors,
            };
            let plan = synthesize(llm, &inst, &input, p.sub_task, &config_of(&p.config)).await?;
            ActionResponse::Strategy(plan)
        }
        ActionRequest::Audit(p) => {
            let inst = Institution::sanitized(&p.uni, &p.dept);
            let input = AuditInput {
                curriculum: &p.curriculum,
                professors: &p.professors,
                trends: &p.trends,
            };
            ActionResponse::Audit(audit_research(llm, &inst, &input, &config_of(&p.config)).await)
        }
    };
    Ok(response)
}

fn config_of(config: &Option<StageConfig>) -> StageConfig {
    config.clone().unwrap_or_default()
}

/// First `x-forwarded-for` entry, else the peer address, else `unknown`.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
