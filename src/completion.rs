//! Completion client: the seam between the core and the hosted LLM.
//!
//! `OpenAiCompatClient` calls `{base_url}/chat/completions` (Groq by default)
//! with one system and one user message and returns the reply text untouched.
//! One HTTP request per call: no retry, no streaming. The only timeout is the
//! transport timeout from `CompletionSettings`.
//!
//! Calls log model, latency and response size, never prompt contents or the key.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::CompletionSettings;
use crate::domain::GenerationRequest;
use crate::error::RequestFailure;
use crate::util::trunc_for_log;

#[async_trait]
pub trait CompletionClient: Send + Sync {
  /// Model identifier reported to clients and logs.
  fn model(&self) -> &str;

  async fn generate(&self, req: &GenerationRequest) -> Result<String, RequestFailure>;
}

/// Pick the client for these settings. Without an API key every call is
/// rejected by `DisabledClient`.
pub fn build_client(settings: &CompletionSettings) -> Arc<dyn CompletionClient> {
  let Some(key) = settings.api_key.clone() else {
    warn!(target: "prompt_buddy", "Completion disabled (no GROQ_API_KEY)");
    return Arc::new(DisabledClient { model: settings.model.clone() });
  };
  match OpenAiCompatClient::new(settings, key) {
    Ok(c) => {
      info!(target: "prompt_buddy", base_url = %c.base_url, model = %c.model, "Completion enabled");
      Arc::new(c)
    }
    Err(e) => {
      error!(target: "prompt_buddy", error = %e, "Failed to build HTTP client; completion disabled");
      Arc::new(DisabledClient { model: settings.model.clone() })
    }
  }
}

#[derive(Clone)]
pub struct OpenAiCompatClient {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
  temperature: Option<f32>,
}

impl OpenAiCompatClient {
  pub fn new(settings: &CompletionSettings, api_key: String) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .timeout(settings.timeout)
      .build()?;
    Ok(Self {
      client,
      api_key,
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      temperature: settings.temperature,
    })
  }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
  fn model(&self) -> &str { &self.model }

  #[instrument(
    level = "info",
    skip(self, req),
    fields(model = %self.model, system_len = req.system_instruction.len(), user_len = req.user_instruction.len())
  )]
  async fn generate(&self, req: &GenerationRequest) -> Result<String, RequestFailure> {
    let url = format!("{}/chat/completions", self.base_url);
    let body = ChatCompletionRequest {
      model: &self.model,
      messages: [
        ChatMessageReq { role: "system", content: &req.system_instruction },
        ChatMessageReq { role: "user", content: &req.user_instruction },
      ],
      temperature: self.temperature,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "prompt-buddy-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&body).send().await
      .map_err(|e| RequestFailure::new(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      warn!(%status, body = %trunc_for_log(&body, 200), elapsed = ?start.elapsed(), "Completion HTTP error");
      let msg = extract_api_error(&body).unwrap_or_else(|| format!("Completion HTTP {}: {}", status, body.trim()));
      return Err(RequestFailure::new(msg));
    }

    let body: ChatCompletionResponse = res.json().await
      .map_err(|e| RequestFailure::new(format!("Malformed completion response: {}", e)))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Completion usage");
    }
    let text = body.choices.into_iter().next()
      .map(|c| c.message.content.unwrap_or_default())
      .ok_or_else(|| RequestFailure::new("Completion response contained no choices"))?;

    info!(elapsed = ?start.elapsed(), text_len = text.len(), "Completion received");
    Ok(text)
  }
}

/// Stand-in used when no credential is configured.
#[derive(Clone, Debug)]
pub struct DisabledClient {
  model: String,
}

#[async_trait]
impl CompletionClient for DisabledClient {
  fn model(&self) -> &str { &self.model }

  async fn generate(&self, _req: &GenerationRequest) -> Result<String, RequestFailure> {
    Err(RequestFailure::new("Completion service is not configured (set GROQ_API_KEY)"))
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: [ChatMessageReq<'a>; 2],
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
}
#[derive(Serialize)]
struct ChatMessageReq<'a> { role: &'static str, content: &'a str }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Pull `error.message` out of an OpenAI-style error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok()
    .map(|w| w.error.message)
    .filter(|m| !m.trim().is_empty())
}
