//! CodeCraft · tutorial-to-practice backend
//!
//! - Axum HTTP API driving a three-step workflow per session:
//!   paste transcript -> three generated tasks -> one combined evaluation report
//! - Groq (or any OpenAI-compatible) chat completions for generation and evaluation
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   GROQ_API_KEY        : required; the server refuses to start without it
//!   LLM_BASE_URL        : default "https://api.groq.com/openai/v1"
//!   LLM_MODEL           : default "llama-3.1-8b-instant"
//!   LLM_TIMEOUT_SECS    : per-request timeout, default 30
//!   LLM_RETRY_BACKOFF_MS : delay before the single retry, default 500
//!   CODECRAFT_CONFIG_PATH : path to TOML config (prompts + sampling)
//!   PORT                : u16 (default 3000)
//!   SESSION_IDLE_SECS   : drop sessions idle this long (default 3600, 0 = never)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod error;
mod parser;
mod workflow;
mod llm;
mod logic;
mod report;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Settings;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // A missing credential halts here, before anything is served.
  let settings = Settings::from_env().inspect_err(|e| {
    error!(target: "codecraft", error = %e, "Startup aborted");
  })?;

  // Shared application state (session store, completion client, prompts).
  let state = Arc::new(AppState::from_settings(&settings)?);
  let _sweeper = state.spawn_idle_sweeper();

  // HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "codecraft", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "codecraft", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "codecraft", "Shutdown signal received");
}
