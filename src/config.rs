//! Runtime configuration: LLM credentials/endpoint from the environment, plus an optional
//! TOML file (CODECRAFT_CONFIG_PATH) overriding prompts and sampling parameters.
//!
//! See `AgentConfig` and `Prompts` for the TOML schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default = "Sampling::generation")]
  pub generation: Sampling,
  #[serde(default = "Sampling::evaluation")]
  pub evaluation: Sampling,
}

/// Sampling parameters for one of the two completion calls.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Sampling {
  pub temperature: f32,
  pub max_tokens: u32,
}

impl Sampling {
  fn generation() -> Self { Self { temperature: 0.4, max_tokens: 700 } }
  fn evaluation() -> Self { Self { temperature: 0.3, max_tokens: 900 } }
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      generation: Sampling::generation(),
      evaluation: Sampling::evaluation(),
    }
  }
}

/// Prompts used by the completion client.
/// `evaluation_user_template` receives `{task1_code}`, `{task2_code}` and `{task3_code}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prompts {
  pub generation_system: String,
  pub evaluation_system: String,
  pub evaluation_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: r#"You are a coding challenge designer.

From the given tutorial transcript, generate EXACTLY 3 coding tasks.

Rules:
- Task 1: Guided application of what was shown
- Task 2: Independent application (no hints)
- Task 3: Design-oriented task with ambiguity

Return STRICTLY in this format:

TASK 1:
Title:
Description:

TASK 2:
Title:
Description:

TASK 3:
Title:
Description:

Do NOT add anything else."#.into(),
      evaluation_system: r#"You are a senior software engineer evaluating 3 progressive coding tasks.

Analyze the submissions TOGETHER.

Focus on:
- Progression in thinking
- Code quality
- Decision-making
- Strengths and weaknesses
- What the learner should do next

Return structured markdown."#.into(),
      evaluation_user_template: "TASK 1 CODE:\n{task1_code}\n\nTASK 2 CODE:\n{task2_code}\n\nTASK 3 CODE:\n{task3_code}\n".into(),
    }
  }
}

/// Connection settings for the OpenAI-compatible chat-completion endpoint.
#[derive(Clone, Debug)]
pub struct LlmSettings {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout: Duration,
  pub retry_backoff: Duration,
}

#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  /// Sessions untouched for this long are dropped. Zero keeps them forever.
  pub session_idle: Duration,
  pub llm: LlmSettings,
  pub agent: AgentConfig,
}

impl Settings {
  /// Read settings from the process environment. A missing API key is fatal.
  pub fn from_env() -> Result<Self, AppError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
    let api_key = lookup("GROQ_API_KEY")
      .or_else(|| lookup("LLM_API_KEY"))
      .filter(|k| !k.trim().is_empty())
      .ok_or_else(|| AppError::Config("GROQ_API_KEY not found in environment variables".into()))?;

    let number = |key: &str, default: u64| -> Result<u64, AppError> {
      match lookup(key) {
        None => Ok(default),
        Some(v) => v.trim().parse::<u64>()
          .map_err(|e| AppError::Config(format!("{key}={v:?} is not a number: {e}"))),
      }
    };

    let llm = LlmSettings {
      api_key,
      base_url: lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
      model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
      timeout: Duration::from_secs(number("LLM_TIMEOUT_SECS", 30)?),
      retry_backoff: Duration::from_millis(number("LLM_RETRY_BACKOFF_MS", 500)?),
    };

    let port = number("PORT", 3000)?;
    let port = u16::try_from(port).map_err(|_| AppError::Config(format!("PORT={port} is out of range")))?;
    let session_idle = Duration::from_secs(number("SESSION_IDLE_SECS", 3600)?);

    let agent = match lookup("CODECRAFT_CONFIG_PATH") {
      Some(path) => load_agent_config(&path)?,
      None => AgentConfig::default(),
    };

    Ok(Self { port, session_idle, llm, agent })
  }
}

/// Load `AgentConfig` from a TOML file. A path that was set but cannot be read or parsed is an error.
pub fn load_agent_config(path: &str) -> Result<AgentConfig, AppError> {
  let raw = std::fs::read_to_string(path)
    .map_err(|e| AppError::Config(format!("failed to read {path}: {e}")))?;
  let cfg = toml::from_str::<AgentConfig>(&raw)
    .map_err(|e| AppError::Config(format!("failed to parse {path}: {e}")))?;
  info!(target: "codecraft", %path, "Loaded agent config (TOML)");
  Ok(cfg)
}
