//! Scripted in-memory provider for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::provider::{ChunkStream, GenerateOptions, Generation, GenerativeProvider, StreamChunk};
use super::LlmError;

pub enum Script {
    Fail(LlmError),
    Chunks(Vec<StreamChunk>),
    /// Each chunk arrives after its own delay.
    Delayed(Vec<(Duration, StreamChunk)>),
    /// Yields the chunks, then never yields again.
    Stall(Vec<StreamChunk>),
    /// The call never resolves.
    NeverConnect,
}

impl Script {
    pub fn text(text: impl Into<String>) -> Self {
        Script::Chunks(vec![StreamChunk {
            text: text.into(),
            grounding: None,
        }])
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub prompt: String,
    pub streamed: bool,
    pub grounded: bool,
}

type Responder = Box<dyn Fn(&str, &str) -> Script + Send + Sync>;

enum Mode {
    Sequence(Mutex<VecDeque<Script>>),
    Responder(Responder),
}

pub struct ScriptedProvider {
    mode: Mode,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    /// Answers calls in order; once exhausted every call fails fatally.
    pub fn sequence(scripts: Vec<Script>) -> Self {
        Self {
            mode: Mode::Sequence(Mutex::new(scripts.into())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers each call from `(model, prompt)`.
    pub fn responder(f: impl Fn(&str, &str) -> Script + Send + Sync + 'static) -> Self {
        Self {
            mode: Mode::Responder(Box::new(f)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }

    fn next_script(&self, model: &str, prompt: &str, options: &GenerateOptions, streamed: bool) -> Script {
        self.calls.lock().unwrap().push(Call {
            model: model.to_string(),
            prompt: prompt.to_string(),
            streamed,
            grounded: options.web_grounding,
        });
        match &self.mode {
            Mode::Sequence(queue) => queue.lock().unwrap().pop_front().unwrap_or_else(|| {
                Script::Fail(LlmError::Api {
                    status: 400,
                    message: "script exhausted".into(),
                })
            }),
            Mode::Responder(f) => f(model, prompt),
        }
    }
}

fn concat(chunks: &[StreamChunk]) -> Generation {
    let mut generation = Generation::default();
    for chunk in chunks {
        generation.text.push_str(&chunk.text);
        if chunk.grounding.is_some() {
            generation.grounding = chunk.grounding.clone();
        }
    }
    generation
}

#[async_trait]
impl GenerativeProvider for ScriptedProvider {
    async fn generate_once(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        match self.next_script(model, prompt, options, false) {
            Script::Fail(e) => Err(e),
            Script::Chunks(chunks) => Ok(concat(&chunks)),
            Script::Delayed(items) => {
                let mut chunks = Vec::new();
                for (delay, chunk) in items {
                    tokio::time::sleep(delay).await;
                    chunks.push(chunk);
                }
                Ok(concat(&chunks))
            }
            Script::Stall(_) | Script::NeverConnect => std::future::pending().await,
        }
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<ChunkStream, LlmError> {
        match self.next_script(model, prompt, options, true) {
            Script::Fail(e) => Err(e),
            Script::Chunks(chunks) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
            Script::Delayed(items) => Ok(stream::iter(items)
                .then(|(delay, chunk)| async move {
                    tokio::time::sleep(delay).await;
                    Ok(chunk)
                })
                .boxed()),
            Script::Stall(chunks) => Ok(stream::iter(chunks.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Script::NeverConnect => std::future::pending().await,
        }
    }
}
