use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::gemini::DEFAULT_BASE_URL;
use crate::llm_client::LlmSettings;
use crate::rate_limit::RateLimitConfig;

/// Application configuration loaded from environment variables once at start.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    /// Anything but `API_ENABLED=true` answers every action with 503.
    pub api_enabled: bool,
    /// `*` allows any origin.
    pub allowed_origins: Vec<String>,
    pub port: u16,
    pub rust_log: String,
    pub provider_base_url: String,
    pub model_default: String,
    pub model_fallback: String,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_key: require_env("API_KEY")?,
            api_enabled: std::env::var("API_ENABLED").map(|v| v == "true").unwrap_or(false),
            allowed_origins: parse_origins(&env_or("ALLOWED_ORIGINS", "*")),
            port: env_or("PORT", "3001")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            provider_base_url: env_or("PROVIDER_BASE_URL", DEFAULT_BASE_URL),
            model_default: env_or("MODEL_DEFAULT", "gemini-2.5-flash"),
            model_fallback: env_or("MODEL_FALLBACK", "gemini-2.5-pro"),
            rate_limit: server_rate_limit(
                std::env::var("RATE_LIMIT_MAX_REQUESTS").ok().as_deref(),
                std::env::var("RATE_LIMIT_WINDOW_SECS").ok().as_deref(),
            )?,
        })
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings::new(&self.model_default, &self.model_fallback)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Server quota from the two optional variables; unset ones keep
/// `RateLimitConfig::SERVER`.
fn server_rate_limit(max_requests: Option<&str>, window_secs: Option<&str>) -> Result<RateLimitConfig> {
    let mut limit = RateLimitConfig::SERVER;
    if let Some(raw) = max_requests {
        limit.max_requests = raw
            .parse()
            .context("RATE_LIMIT_MAX_REQUESTS must be a positive integer")?;
    }
    if let Some(raw) = window_secs {
        limit.window = Duration::from_secs(
            raw.parse()
                .context("RATE_LIMIT_WINDOW_SECS must be a number of seconds")?,
        );
    }
    Ok(limit)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
