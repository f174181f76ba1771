//! Error taxonomy and its HTTP mapping.
//!
//! - `Config`: fatal at startup (missing credential, unreadable config file).
//! - `Validation`: a workflow guard refused the action; rendered as a warning, nothing changed.
//! - `Generation` / `Evaluation`: the upstream call or the reply itself was unusable; rendered
//!   with a retry affordance. The session is left exactly as it was before the request.
//! - `BadRequest`: a request body that could not be read; nothing changed.
//! - `NotFound` / `NoReport`: unknown session id, or a download before any evaluation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;
use crate::parser::ParseError;
use crate::workflow::WorkflowError;

/// Why an upstream round-trip produced nothing usable.
#[derive(Debug, Error)]
pub enum UpstreamFailure {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("malformed response: {0}")]
    Malformed(#[from] ParseError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Validation(#[from] WorkflowError),
    #[error("could not generate tasks, try again")]
    Generation(#[source] UpstreamFailure),
    #[error("could not evaluate your solutions, try again")]
    Evaluation(#[source] UpstreamFailure),
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error("unknown session: {0}")]
    NotFound(String),
    #[error("no evaluation report yet")]
    NoReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input problem; show it inline, nothing to retry.
    Warning,
    /// Upstream problem; offer a retry.
    Retry,
    Error,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(e) => match e {
                WorkflowError::EmptyTranscript
                | WorkflowError::NoSavedSubmission
                | WorkflowError::InvalidTask(_) => StatusCode::UNPROCESSABLE_ENTITY,
                WorkflowError::TranscriptLocked | WorkflowError::NoTasks | WorkflowError::NotReviewing => {
                    StatusCode::CONFLICT
                }
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Generation(_) | AppError::Evaluation(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) | AppError::NoReport => StatusCode::NOT_FOUND,
        }
    }

    fn body(&self) -> ErrorOut {
        let (kind, detail) = match self {
            AppError::Validation(_) | AppError::BadRequest(_) => (ErrorKind::Warning, None),
            AppError::Generation(cause) | AppError::Evaluation(cause) => (ErrorKind::Retry, Some(cause.to_string())),
            AppError::Config(_) | AppError::NotFound(_) | AppError::NoReport => (ErrorKind::Error, None),
        };
        ErrorOut { kind, message: self.to_string(), detail }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
