//! HTTP endpoint handlers. These are thin wrappers that forward to the workflow and core logic.
//! Each handler is instrumented and logs the session id and basic result info.

use std::sync::Arc;
use axum::{body::Bytes, extract::{Path, State}, Json, http::StatusCode, response::IntoResponse};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::logic::{evaluate, generate};
use crate::protocol::*;
use crate::report::ReportDownload;
use crate::state::AppState;

type ApiResult<T> = Result<T, AppError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (id, handle) = state.create_session().await;
  let session = handle.lock().await;
  (StatusCode::CREATED, Json(SessionOut::of(&id, &session)))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<Json<SessionOut>> {
  let handle = state.session(&id).await?;
  let session = handle.lock().await;
  Ok(Json(SessionOut::of(&id, &session)))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<StatusCode> {
  state.remove_session(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(%id, transcript_len = body.transcript.len()))]
pub async fn http_generate(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<GenerateIn>,
) -> ApiResult<Json<SessionOut>> {
  let handle = state.session(&id).await?;
  let mut session = handle.lock().await;
  generate(&mut session, state.backend.as_ref(), &state.agent, &body.transcript).await?;
  info!(target: "codecraft", session = %id, "HTTP generate served");
  Ok(Json(SessionOut::of(&id, &session)))
}

#[instrument(level = "info", skip(state, body), fields(%id, %task, code_len = body.code.len()))]
pub async fn http_edit_submission(
  State(state): State<Arc<AppState>>,
  Path((id, task)): Path<(String, usize)>,
  Json(body): Json<CodeIn>,
) -> ApiResult<Json<SessionOut>> {
  let handle = state.session(&id).await?;
  let mut session = handle.lock().await;
  session.edit_submission(task, body.code)?;
  Ok(Json(SessionOut::of(&id, &session)))
}

#[instrument(level = "info", skip(state, body), fields(%id, %task))]
pub async fn http_save_submission(
  State(state): State<Arc<AppState>>,
  Path((id, task)): Path<(String, usize)>,
  body: Bytes,
) -> ApiResult<Json<SessionOut>> {
  let body = parse_save_body(&body)?;
  let handle = state.session(&id).await?;
  let mut session = handle.lock().await;
  session.save_submission(task, body.code)?;
  info!(target: "codecraft", session = %id, task, "Task saved");
  Ok(Json(SessionOut::of(&id, &session)))
}

/// An empty body saves whatever is already in the slot. Anything else must be a valid
/// `SaveIn`, with or without a JSON content type.
fn parse_save_body(raw: &[u8]) -> ApiResult<SaveIn> {
  if raw.iter().all(u8::is_ascii_whitespace) {
    return Ok(SaveIn::default());
  }
  serde_json::from_slice(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_evaluate(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<Json<SessionOut>> {
  let handle = state.session(&id).await?;
  let mut session = handle.lock().await;
  evaluate(&mut session, state.backend.as_ref(), &state.agent).await?;
  info!(target: "codecraft", session = %id, saved = session.saved_count(), "HTTP evaluate served");
  Ok(Json(SessionOut::of(&id, &session)))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_edit_solutions(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<Json<SessionOut>> {
  let handle = state.session(&id).await?;
  let mut session = handle.lock().await;
  session.edit_solutions()?;
  Ok(Json(SessionOut::of(&id, &session)))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_new_tasks(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<Json<SessionOut>> {
  let handle = state.session(&id).await?;
  let mut session = handle.lock().await;
  session.try_new_tasks()?;
  Ok(Json(SessionOut::of(&id, &session)))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_reset(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<Json<SessionOut>> {
  let handle = state.session(&id).await?;
  let mut session = handle.lock().await;
  session.reset();
  Ok(Json(SessionOut::of(&id, &session)))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_download_report(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<ReportDownload> {
  let handle = state.session(&id).await?;
  let session = handle.lock().await;
  let report = session.report().cloned().ok_or(AppError::NoReport)?;
  info!(target: "codecraft", session = %id, report_len = report.as_str().len(), "Report downloaded");
  Ok(ReportDownload(report))
}

#[cfg(test)]
mod tests {
  use axum::body::Body;
  use axum::http::{header, Request};
  use axum::Router;
  use serde_json::{json, Value};
  use tower::ServiceExt;

  use crate::config::AgentConfig;
  use crate::llm::testing::ScriptedBackend;
  use crate::llm::LlmError;
  use crate::routes::api_router;
  use super::*;

  const TASKS_REPLY: &str = "TASK 1:\nTitle: Echo\nDescription: Print the input.\n\n\
    TASK 2:\nTitle: Count\nDescription: Count words.\n\n\
    TASK 3:\nTitle: Index\nDescription: Design a word index.";

  fn app(replies: Vec<Result<String, LlmError>>) -> Router {
    let state = AppState::with_backend(Arc::new(ScriptedBackend::new(replies)), AgentConfig::default());
    api_router(Arc::new(state))
  }

  async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        req = req.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
  }

  async fn new_session(app: &Router) -> String {
    let (status, json) = call(app, "POST", "/api/v1/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["view"]["step"], 1);
    json["id"].as_str().unwrap().to_string()
  }

  #[tokio::test]
  async fn health_returns_ok() {
    let app = app(vec![]);
    let (status, json) = call(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
  }

  #[tokio::test]
  async fn unknown_session_is_not_found() {
    let app = app(vec![]);
    let (status, json) = call(&app, "GET", "/api/v1/sessions/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "error");
  }

  #[tokio::test]
  async fn empty_transcript_is_a_warning() {
    let app = app(vec![]);
    let id = new_session(&app).await;
    let uri = format!("/api/v1/sessions/{id}/generate");
    let (status, json) = call(&app, "POST", &uri, Some(json!({ "transcript": "" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "warning");
    assert_eq!(json["message"], "Please paste a transcript first.");

    let (_, json) = call(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(json["view"]["step"], 1);
    assert_eq!(json["view"]["transcript_locked"], false);
  }

  #[tokio::test]
  async fn malformed_generation_offers_retry() {
    let app = app(vec![Ok("TASK 1:\nTitle: only one".into())]);
    let id = new_session(&app).await;
    let uri = format!("/api/v1/sessions/{id}/generate");
    let (status, json) = call(&app, "POST", &uri, Some(json!({ "transcript": "X" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["kind"], "retry");
    assert_eq!(json["message"], "could not generate tasks, try again");

    let (_, json) = call(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
    assert_eq!(json["tasks"], json!([]));
  }

  #[tokio::test]
  async fn full_workflow_ends_with_a_markdown_download() {
    let app = app(vec![Ok(TASKS_REPLY.into()), Ok("# Review\nNice.".into())]);
    let id = new_session(&app).await;
    let base = format!("/api/v1/sessions/{id}");

    let (status, json) = call(&app, "POST", &format!("{base}/generate"), Some(json!({ "transcript": "X" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["view"]["step"], 2);
    assert_eq!(json["tasks"][0]["marker"], "🟢");
    assert_eq!(json["tasks"][2]["level"], 3);

    let (status, _) = call(&app, "POST", &format!("{base}/evaluate"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&app, "PUT", &format!("{base}/submissions/1"), Some(json!({ "code": "print(input())" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = call(&app, "POST", &format!("{base}/submissions/1/save"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["view"]["submitted"], json!([true, false, false]));
    assert_eq!(json["submissions"][0]["code"], "print(input())");

    let (status, json) = call(&app, "POST", &format!("{base}/evaluate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["view"]["step"], 3);
    assert_eq!(json["report_stats"]["progress_level"], "Task 1/3");

    let resp = app
      .clone()
      .oneshot(Request::builder().uri(format!("{base}/report")).body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/markdown; charset=utf-8");
    assert_eq!(
      resp.headers()[header::CONTENT_DISPOSITION],
      "attachment; filename=\"codecraft_feedback.md\""
    );
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"# Review\nNice.");

    let (status, json) = call(&app, "POST", &format!("{base}/edit-solutions"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["view"]["step"], 2);
    assert_eq!(json["view"]["submitted"], json!([true, false, false]));
    let (status, _) = call(&app, "GET", &format!("{base}/report"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  async fn save_raw(app: &Router, uri: &str, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
    let mut req = Request::builder().method("POST").uri(uri);
    if let Some(ct) = content_type {
      req = req.header(header::CONTENT_TYPE, ct);
    }
    let resp = app.clone().oneshot(req.body(Body::from(body.to_string())).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn save_body_is_read_without_a_content_type() {
    let app = app(vec![Ok(TASKS_REPLY.into())]);
    let id = new_session(&app).await;
    let base = format!("/api/v1/sessions/{id}");
    call(&app, "POST", &format!("{base}/generate"), Some(json!({ "transcript": "X" }))).await;

    let (status, json) = save_raw(&app, &format!("{base}/submissions/1/save"), None, r#"{"code":"print(42)"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["submissions"][0]["code"], "print(42)");
    assert_eq!(json["submissions"][0]["saved"], true);
  }

  #[tokio::test]
  async fn unreadable_save_body_changes_nothing() {
    let app = app(vec![Ok(TASKS_REPLY.into())]);
    let id = new_session(&app).await;
    let base = format!("/api/v1/sessions/{id}");
    call(&app, "POST", &format!("{base}/generate"), Some(json!({ "transcript": "X" }))).await;
    call(&app, "PUT", &format!("{base}/submissions/2"), Some(json!({ "code": "draft" }))).await;

    let uri = format!("{base}/submissions/2/save");
    let (status, json) = save_raw(&app, &uri, Some("application/json"), r#"{"code":42}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "warning");
    let (status, _) = save_raw(&app, &uri, None, "print(42)").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = call(&app, "GET", &base, None).await;
    assert_eq!(json["submissions"][1]["code"], "draft");
    assert_eq!(json["submissions"][1]["saved"], false);
    assert_eq!(json["view"]["submitted"], json!([false, false, false]));
  }

  #[tokio::test]
  async fn reset_and_delete() {
    let app = app(vec![Ok(TASKS_REPLY.into())]);
    let id = new_session(&app).await;
    let base = format!("/api/v1/sessions/{id}");
    call(&app, "POST", &format!("{base}/generate"), Some(json!({ "transcript": "X" }))).await;

    let (status, json) = call(&app, "POST", &format!("{base}/reset"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["view"]["step"], 1);
    assert_eq!(json["transcript"], "");

    let (status, _) = call(&app, "DELETE", &base, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", &base, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
