//! Gemini REST adapter.
//!
//! Normalizes every response shape into `StreamChunk` / `Generation` so nothing
//! above this module inspects provider JSON.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::provider::{
    ChunkStream, GenerateOptions, Generation, GenerativeProvider, GroundingChunk,
    GroundingMetadata, StreamChunk,
};
use super::LlmError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, options: &'a GenerateOptions) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: options.system_instruction.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            tools: if options.web_grounding {
                vec![json!({ "googleSearch": {} })]
            } else {
                Vec::new()
            },
            generation_config: options.json_response.then(|| GenerationConfig {
                response_mime_type: "application/json",
                response_schema: options.response_schema.as_ref(),
            }),
        }
    }
}

/// Every response shape the provider has been seen to send.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawChunk {
    Candidates { candidates: Vec<RawCandidate> },
    Text { text: String },
    Other(serde::de::IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    #[serde(default)]
    content: Option<RawContent>,
    #[serde(default)]
    grounding_metadata: Option<RawGrounding>,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(default)]
    parts: Vec<RawPart>,
}

#[derive(Debug, Deserialize)]
struct RawPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGrounding {
    #[serde(default)]
    grounding_chunks: Vec<RawGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct RawGroundingChunk {
    #[serde(default)]
    web: Option<RawWeb>,
}

#[derive(Debug, Deserialize)]
struct RawWeb {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    error: RawErrorBody,
}

#[derive(Debug, Deserialize)]
struct RawErrorBody {
    message: String,
}

impl From<RawChunk> for StreamChunk {
    fn from(raw: RawChunk) -> Self {
        match raw {
            RawChunk::Text { text } => StreamChunk {
                text,
                grounding: None,
            },
            RawChunk::Other(_) => StreamChunk::default(),
            RawChunk::Candidates { candidates } => {
                let Some(first) = candidates.into_iter().next() else {
                    return StreamChunk::default();
                };
                let text = first
                    .content
                    .map(|c| {
                        c.parts
                            .into_iter()
                            .filter(|p| !p.thought)
                            .filter_map(|p| p.text)
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                let grounding = first.grounding_metadata.map(|g| GroundingMetadata {
                    chunks: g
                        .grounding_chunks
                        .into_iter()
                        .filter_map(|c| c.web)
                        .map(|w| GroundingChunk {
                            title: w.title,
                            uri: w.uri,
                        })
                        .collect(),
                });
                StreamChunk { text, grounding }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SSE decoding
// ────────────────────────────────────────────────────────────────────────────

/// Splits a server-sent-event byte stream into normalized chunks.
/// Bytes are buffered until a full event arrives so multi-byte characters
/// split across network reads survive intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamChunk, LlmError>> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(item) = decode_event(&event) {
                out.push(item);
            }
        }
        out
    }

    /// Flushes a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Vec<Result<StreamChunk, LlmError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_event(&rest).into_iter().collect()
    }
}

fn decode_event(event: &[u8]) -> Option<Result<StreamChunk, LlmError>> {
    let event = String::from_utf8_lossy(event);
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");

    if data.trim().is_empty() || data.trim() == "[DONE]" {
        return None;
    }

    Some(
        serde_json::from_str::<RawChunk>(&data)
            .map(StreamChunk::from)
            .map_err(LlmError::Parse),
    )
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamChunk, LlmError>>,
    done: bool,
}

fn sse_stream(body: BoxStream<'static, reqwest::Result<Bytes>>) -> ChunkStream {
    let state = SseState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => st.pending.extend(st.decoder.push(&bytes)),
                Some(Err(e)) => {
                    st.done = true;
                    st.pending.push_back(Err(LlmError::Transport(e.to_string())));
                }
                None => {
                    st.done = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

// ────────────────────────────────────────────────────────────────────────────
// Adapter
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post(&self, url: &str, body: &GenerateRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Provider returned {}: {}", status, body.chars().take(300).collect::<String>());
        let message = serde_json::from_str::<RawError>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(LlmError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn generate_once(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        let request = GenerateRequest::new(prompt, options);
        let response = self.post(&self.url(model, "generateContent"), &request).await?;
        let raw: RawChunk = response.json().await?;
        let chunk = StreamChunk::from(raw);
        debug!(model, chars = chunk.text.len(), "generateContent returned");
        Ok(Generation {
            text: chunk.text,
            grounding: chunk.grounding,
        })
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<ChunkStream, LlmError> {
        let request = GenerateRequest::new(prompt, options);
        let url = format!("{}?alt=sse", self.url(model, "streamGenerateContent"));
        let response = self.post(&url, &request).await?;
        Ok(sse_stream(response.bytes_stream().boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_grounding_and_schema() {
        let options = GenerateOptions::grounded()
            .with_schema(json!({"type": "OBJECT"}))
            .with_system("Output only JSON.");
        let value = serde_json::to_value(GenerateRequest::new("hello", &options)).unwrap();

        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Output only JSON.");
        assert_eq!(value["tools"][0], json!({"googleSearch": {}}));
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_plain_request_omits_optional_sections() {
        let options = GenerateOptions::default();
        let value = serde_json::to_value(GenerateRequest::new("hi", &options)).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("generationConfig").is_none());
        assert!(value.get("systemInstruction").is_none());
    }

    #[test]
    fn test_candidate_chunk_normalizes_text_and_citations() {
        let raw: RawChunk = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "thinking", "thought": true}, {"text": "안녕"}, {"text": "하세요"}]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://a.ac.kr", "title": "A"}},
                    {"retrievedContext": {}}
                ]}
            }]
        }))
        .unwrap();

        let chunk = StreamChunk::from(raw);
        assert_eq!(chunk.text, "안녕하세요");
        let grounding = chunk.grounding.unwrap();
        assert_eq!(grounding.chunks.len(), 1);
        assert_eq!(grounding.chunks[0].uri.as_deref(), Some("https://a.ac.kr"));
    }

    #[test]
    fn test_bare_text_and_unknown_shapes_normalize() {
        let text: RawChunk = serde_json::from_value(json!({"text": "plain"})).unwrap();
        assert_eq!(StreamChunk::from(text).text, "plain");

        let blocked: RawChunk =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert_eq!(StreamChunk::from(blocked), StreamChunk::default());
    }

    #[test]
    fn test_sse_decoder_handles_split_multibyte_and_crlf() {
        let event = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"한국\"}]}}]}\r\n\r\n";
        let bytes = event.as_bytes();
        // Split inside the first Hangul character.
        let split = event.find("한").unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let items = decoder.push(&bytes[split..]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().text, "한국");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_sse_decoder_flushes_trailing_event_and_skips_done() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(b"data: [DONE]\n\ndata: {\"text\": \"tail\"}");
        assert!(items.is_empty());
        let rest = decoder.finish();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].as_ref().unwrap().text, "tail");
    }

    #[test]
    fn test_sse_decoder_reports_malformed_event() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(b"data: {not json\n\n");
        assert!(matches!(items.as_slice(), [Err(LlmError::Parse(_))]));
    }
}
