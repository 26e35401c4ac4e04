pub mod config;
pub mod errors;
pub mod llm_client;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod routes;
pub mod stages;
pub mod state;
