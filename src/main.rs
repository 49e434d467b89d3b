//! Prompt Buddy · prompt suggestion backend
//!
//! - Axum HTTP + WebSocket API over a per-session generation state machine
//! - Groq (OpenAI-compatible) chat completions
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                     : u16 (default 3000)
//!   GROQ_API_KEY             : enables generation if present
//!   LLM_BASE_URL             : default "https://api.groq.com/openai/v1"
//!   LLM_MODEL                : default "llama3-groq-70b-8192-tool-use-preview"
//!   LLM_TEMPERATURE          : optional sampling temperature
//!   LLM_TIMEOUT_SECS         : HTTP transport timeout (default 60, must be > 0)
//!   SESSION_IDLE_SECS        : idle sessions are dropped after this (default 1800)
//!   PROMPT_BUDDY_CONFIG_PATH : path to TOML config (preset, topics, suggestions, prompts)
//!   LOG_LEVEL                : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT               : "pretty" (default) or "json"

mod completion;
mod composer;
mod config;
mod domain;
mod error;
mod presenter;
mod protocol;
mod routes;
mod session;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::completion::build_client;
use crate::config::{load_buddy_config_from_env, CompletionSettings, SessionSettings};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Environment is read here once; everything below receives explicit values.
  let buddy = load_buddy_config_from_env();
  let settings = CompletionSettings::from_env()?;
  let sessions = SessionSettings::from_env()?;
  let client = build_client(&settings);

  let state = Arc::new(AppState::new(buddy, client).with_session_settings(sessions));
  spawn_session_sweeper(state.clone());
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "prompt_buddy", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "prompt_buddy", "Server stopped");
  Ok(())
}

/// Periodically drops idle sessions so a quiet server does not hold them forever.
fn spawn_session_sweeper(state: Arc<AppState>) {
  let period = (state.session_idle_ttl / 2).max(Duration::from_secs(1));
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      state.evict_idle_sessions().await;
    }
  });
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "prompt_buddy", error = %e, "Failed to listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "prompt_buddy", "Shutdown requested");
}
