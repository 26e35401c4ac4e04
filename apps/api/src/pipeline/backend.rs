//! The controller's view of the stage handlers.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    AuditReport, ProfessorAnalysisResult, ResearchResult, StrategicPlan, ValidationResult,
};
use crate::stages::handlers::{ActionRequest, AuditPayload, InstitutionPayload, SynthesisPayload};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid backend configuration: {0}")]
    Config(String),
}

/// One call per stage. Implementations must not touch controller state.
#[async_trait]
pub trait StageBackend: Send + Sync {
    async fn validate(&self, uni: &str, dept: &str) -> Result<ValidationResult, BackendError>;
    async fn curriculum(&self, uni: &str, dept: &str) -> Result<ResearchResult, BackendError>;
    async fn professors(&self, uni: &str, dept: &str) -> Result<ProfessorAnalysisResult, BackendError>;
    async fn trends(&self, uni: &str, dept: &str) -> Result<ResearchResult, BackendError>;
    async fn synthesis(&self, request: SynthesisPayload) -> Result<StrategicPlan, BackendError>;
    async fn audit(&self, request: AuditPayload) -> Result<AuditReport, BackendError>;
}

/// Talks to the `/api/gemini` action endpoint.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(server: &str) -> Result<Self, BackendError> {
        let server = server.trim_end_matches('/');
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(BackendError::Config(format!("server must be an http(s) URL, got '{server}'")));
        }
        // No overall timeout: stage deadlines are enforced server-side.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{server}/api/gemini"),
        })
    }

    async fn call<T: DeserializeOwned>(&self, request: ActionRequest) -> Result<T, BackendError> {
        debug!(action = request.name(), "calling backend");
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error"))
                .to_string();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

fn institution(uni: &str, dept: &str) -> InstitutionPayload {
    InstitutionPayload {
        uni: uni.to_string(),
        dept: dept.to_string(),
        config: None,
    }
}

#[async_trait]
impl StageBackend for HttpBackend {
    async fn validate(&self, uni: &str, dept: &str) -> Result<ValidationResult, BackendError> {
        self.call(ActionRequest::Validate(institution(uni, dept))).await
    }

    async fn curriculum(&self, uni: &str, dept: &str) -> Result<ResearchResult, BackendError> {
        self.call(ActionRequest::Curriculum(institution(uni, dept))).await
    }

    async fn professors(&self, uni: &str, dept: &str) -> Result<ProfessorAnalysisResult, BackendError> {
        self.call(ActionRequest::Professors(institution(uni, dept))).await
    }

    async fn trends(&self, uni: &str, dept: &str) -> Result<ResearchResult, BackendError> {
        self.call(ActionRequest::Trends(institution(uni, dept))).await
    }

    async fn synthesis(&self, request: SynthesisPayload) -> Result<StrategicPlan, BackendError> {
        self.call(ActionRequest::Synthesis(request)).await
    }

    async fn audit(&self, request: AuditPayload) -> Result<AuditReport, BackendError> {
        self.call(ActionRequest::Audit(request)).await
    }
}
