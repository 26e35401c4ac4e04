use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use prep_api::config::Config;
use prep_api::llm_client::gemini::GeminiProvider;
use prep_api::llm_client::LlmClient;
use prep_api::routes::build_router;
use prep_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("prep_api={},tower_http={}", &config.rust_log, &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting prep API v{}", env!("CARGO_PKG_VERSION"));
    if !config.api_enabled {
        warn!("API_ENABLED is not 'true'; every action will answer 503");
    }

    // Initialize LLM client
    let provider = GeminiProvider::new(config.api_key.clone(), config.provider_base_url.clone())?;
    let llm = LlmClient::new(Arc::new(provider), config.llm_settings());
    info!(
        "LLM client initialized (model: {}, fallback: {})",
        config.model_default, config.model_fallback
    );

    let state = AppState::new(llm, config.clone());

    // Build router
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
