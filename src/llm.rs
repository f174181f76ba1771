//! Minimal chat-completion client (Groq or any OpenAI-compatible endpoint) and the two calls
//! the workflow needs: task generation and combined evaluation.
//!
//! Calls are instrumented and log model name, latency, token usage and payload sizes (not
//! contents). Every call has a request timeout and is retried once, after a jittered backoff,
//! on transport errors, timeouts, 429 and 5xx.
//!
//! NOTE: We never log the API key.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::{AgentConfig, LlmSettings, Sampling};
use crate::domain::{EvaluationReport, Task, TASK_COUNT};
use crate::error::{AppError, UpstreamFailure};
use crate::parser::parse_tasks;
use crate::util::{fill_template, trunc_for_log};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
  #[error("request timed out")]
  Timeout,
  #[error("transport error: {0}")]
  Transport(String),
  #[error("HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("could not decode completion: {0}")]
  Decode(String),
  #[error("model returned an empty reply")]
  EmptyReply,
}

impl LlmError {
  /// Worth one more attempt: network trouble, rate limiting, server-side failures.
  pub fn is_retryable(&self) -> bool {
    match self {
      LlmError::Timeout | LlmError::Transport(_) => true,
      LlmError::Http { status, .. } => *status == 429 || *status >= 500,
      LlmError::Decode(_) | LlmError::EmptyReply => false,
    }
  }
}

impl From<reqwest::Error> for LlmError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() { LlmError::Timeout } else { LlmError::Transport(e.to_string()) }
  }
}

/// One system + one user message.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
  pub system: &'a str,
  pub user: &'a str,
  pub sampling: Sampling,
}

/// The seam between the workflow and the hosted model.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
  /// Return the assistant message text (trimmed, non-empty).
  async fn complete(&self, req: CompletionRequest<'_>) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct ChatClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  pub retry_backoff: Duration,
}

impl ChatClient {
  pub fn new(settings: &LlmSettings) -> Result<Self, AppError> {
    let client = reqwest::Client::builder()
      .timeout(settings.timeout)
      .build()
      .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;

    Ok(Self {
      client,
      api_key: settings.api_key.clone(),
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      retry_backoff: settings.retry_backoff,
    })
  }

  /// A single chat.completions round-trip.
  #[instrument(level = "info", skip(self, req), fields(model = %self.model, system_len = req.system.len(), user_len = req.user.len()))]
  async fn chat_once(&self, req: &CompletionRequest<'_>) -> Result<String, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let body = ChatCompletionRequest {
      model: &self.model,
      messages: vec![
        ChatMessageReq { role: "system", content: req.system },
        ChatMessageReq { role: "user", content: req.user },
      ],
      temperature: req.sampling.temperature,
      max_tokens: Some(req.sampling.max_tokens),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "codecraft-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&body).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(LlmError::Http { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| LlmError::Decode(e.to_string()))?;
    let elapsed = start.elapsed();
    if let Some(usage) = &body.usage {
      info!(?elapsed, prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Completion usage");
    }

    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default().trim().to_string();
    if text.is_empty() {
      return Err(LlmError::EmptyReply);
    }
    Ok(text)
  }
}

#[async_trait]
impl CompletionBackend for ChatClient {
  async fn complete(&self, req: CompletionRequest<'_>) -> Result<String, LlmError> {
    with_single_retry(self.retry_backoff, || self.chat_once(&req)).await
  }
}

/// Run `call`, and once more after `backoff` (+ up to half of it as jitter) if the first
/// failure is retryable.
pub async fn with_single_retry<F, Fut>(backoff: Duration, mut call: F) -> Result<String, LlmError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<String, LlmError>>,
{
  match call().await {
    Err(e) if e.is_retryable() => {
      let half = backoff.as_millis() as u64 / 2;
      let delay = backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=half));
      warn!(error = %e, ?delay, "Completion failed; retrying once");
      tokio::time::sleep(delay).await;
      call().await
    }
    other => other,
  }
}

// --- High-level calls ---

/// Ask the model for three tasks built from `transcript` and parse them.
#[instrument(level = "info", skip(backend, config, transcript), fields(transcript_len = transcript.len()))]
pub async fn generate_tasks(
  backend: &dyn CompletionBackend,
  config: &AgentConfig,
  transcript: &str,
) -> Result<[Task; TASK_COUNT], UpstreamFailure> {
  let req = CompletionRequest {
    system: &config.prompts.generation_system,
    user: transcript,
    sampling: config.generation,
  };

  let start = Instant::now();
  let reply = backend.complete(req).await.inspect_err(|e| {
    error!(elapsed = ?start.elapsed(), error = %e, "Model call failed during task generation");
  })?;

  let tasks = parse_tasks(&reply).inspect_err(|e| {
    error!(error = %e, reply_preview = %trunc_for_log(&reply, 120), "Generation reply did not match the task format");
  })?;

  info!(
    elapsed = ?start.elapsed(),
    titles = ?tasks.iter().map(|t| t.title.chars().take(40).collect::<String>()).collect::<Vec<_>>(),
    "Tasks generated"
  );
  Ok(tasks)
}

/// Ask the model for one combined review of the three code bodies. The markdown is returned as is.
#[instrument(level = "info", skip(backend, config, codes), fields(code_lens = ?codes.iter().map(String::len).collect::<Vec<_>>()))]
pub async fn evaluate_all(
  backend: &dyn CompletionBackend,
  config: &AgentConfig,
  codes: &[String; TASK_COUNT],
) -> Result<EvaluationReport, UpstreamFailure> {
  let user = fill_template(
    &config.prompts.evaluation_user_template,
    &[("task1_code", codes[0].as_str()), ("task2_code", codes[1].as_str()), ("task3_code", codes[2].as_str())],
  );
  let req = CompletionRequest {
    system: &config.prompts.evaluation_system,
    user: &user,
    sampling: config.evaluation,
  };

  let start = Instant::now();
  let reply = backend.complete(req).await.inspect_err(|e| {
    error!(elapsed = ?start.elapsed(), error = %e, "Model call failed during evaluation");
  })?;
  info!(elapsed = ?start.elapsed(), report_len = reply.len(), "Evaluation received");
  Ok(EvaluationReport(reply))
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessageReq<'a>>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
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

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
