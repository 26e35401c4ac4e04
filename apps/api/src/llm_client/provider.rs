//! The capability surface the backend needs from a generative AI provider.
//!
//! Adapters normalize whatever the provider sends into `StreamChunk` /
//! `Generation` before anything else sees it.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use super::LlmError;

/// Per-call generation switches.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Enables the provider's web-search tool; responses then carry citations.
    pub web_grounding: bool,
    /// Asks for `application/json` output.
    pub json_response: bool,
    pub response_schema: Option<Value>,
    pub system_instruction: Option<String>,
}

impl GenerateOptions {
    pub fn grounded() -> Self {
        Self {
            web_grounding: true,
            ..Self::default()
        }
    }

    pub fn json() -> Self {
        Self {
            json_response: true,
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.json_response = true;
        self.response_schema = Some(schema);
        self
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// One cited web page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingChunk {
    pub title: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingMetadata {
    pub chunks: Vec<GroundingChunk>,
}

/// Canonical streaming unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

/// A complete response, either single-shot or aggregated from a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, LlmError>>;

#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn generate_once(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError>;

    /// Opens a streaming generation. Resolves once the stream handle exists;
    /// chunks arrive through the returned stream.
    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<ChunkStream, LlmError>;
}
