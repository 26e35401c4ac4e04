//! Stage handlers: one independently invokable operation per pipeline stage.
//!
//! Handlers are pure functions of their inputs plus an `LlmClient`. They
//! absorb provider faults into well-typed defaults wherever one exists and
//! only return `Err` when nothing sensible can be substituted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod agents;
pub mod audit;
pub mod curriculum;
pub mod handlers;
pub mod professors;
pub mod prompts;
pub mod sanitize;
pub mod sources;
pub mod synthesis;
pub mod trends;
pub mod validate;

use sanitize::sanitize_input;

/// Per-request overrides sent by the caller as `payload.config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Stream connection deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Professor detail stagger in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

impl StageConfig {
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(default)
    }

    pub fn stream_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    pub fn delay_or(&self, default: Duration) -> Duration {
        self.delay.map(Duration::from_millis).unwrap_or(default)
    }
}

/// University / department pair after sanitization. Everything embedded in a
/// prompt goes through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Institution {
    pub university: String,
    pub department: String,
}

impl Institution {
    pub fn sanitized(university: &str, department: &str) -> Self {
        Self {
            university: sanitize_input(university),
            department: sanitize_input(department),
        }
    }
}
