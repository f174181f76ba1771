//! Core behaviors behind the HTTP handlers: the two transitions that need the model.
//!
//! Both follow the same shape: check the workflow guard, make the upstream call, and only
//! apply the transition once the reply is usable. A refused guard issues no call; an upstream
//! or parse failure leaves the session exactly as it was.

use tracing::{info, instrument, warn};

use crate::config::AgentConfig;
use crate::error::AppError;
use crate::llm::{evaluate_all, generate_tasks, CompletionBackend};
use crate::workflow::Session;

#[instrument(level = "info", skip_all, fields(transcript_len = transcript.len()))]
pub async fn generate(
  session: &mut Session,
  backend: &dyn CompletionBackend,
  agent: &AgentConfig,
  transcript: &str,
) -> Result<(), AppError> {
  if let Err(e) = session.check_generation(transcript) {
    warn!(target: "workflow", reason = %e, "Generation refused");
    return Err(e.into());
  }

  let tasks = generate_tasks(backend, agent, transcript).await.map_err(AppError::Generation)?;
  session.accept_tasks(transcript, tasks)?;
  info!(target: "workflow", "Tasks ready, transcript locked");
  Ok(())
}

#[instrument(level = "info", skip_all)]
pub async fn evaluate(
  session: &mut Session,
  backend: &dyn CompletionBackend,
  agent: &AgentConfig,
) -> Result<(), AppError> {
  let codes = match session.check_evaluation() {
    Ok(codes) => codes,
    Err(e) => {
      warn!(target: "workflow", reason = %e, "Evaluation refused");
      return Err(e.into());
    }
  };

  let report = evaluate_all(backend, agent, &codes).await.map_err(AppError::Evaluation)?;
  session.accept_report(report)?;
  info!(target: "workflow", saved = session.saved_count(), "Evaluation report ready");
  Ok(())
}
