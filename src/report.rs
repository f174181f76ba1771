//! Evaluation report export: the markdown is offered verbatim as a file download.

use axum::{
  http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::domain::{EvaluationReport, TASK_COUNT};
use crate::workflow::Session;

pub const REPORT_FILE_NAME: &str = "codecraft_feedback.md";
pub const REPORT_MEDIA_TYPE: &str = "text/markdown; charset=utf-8";

/// Summary shown next to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportStats {
  pub tasks_analyzed: usize,
  /// "Task n/3" while incomplete, "Complete" once all three are saved.
  pub progress_level: String,
}

pub fn report_stats(session: &Session) -> Option<ReportStats> {
  session.report()?;
  let n = session.saved_count();
  let progress_level = if n < TASK_COUNT { format!("Task {n}/{TASK_COUNT}") } else { "Complete".to_string() };
  Some(ReportStats { tasks_analyzed: n, progress_level })
}

/// Attachment response carrying the report body unchanged.
pub struct ReportDownload(pub EvaluationReport);

impl IntoResponse for ReportDownload {
  fn into_response(self) -> Response {
    (
      [
        (CONTENT_TYPE, REPORT_MEDIA_TYPE.to_string()),
        (CONTENT_DISPOSITION, format!("attachment; filename=\"{REPORT_FILE_NAME}\"")),
      ],
      self.0 .0,
    )
      .into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::workflow::tests::sample_tasks;

  #[test]
  fn no_stats_without_a_report() {
    let mut s = Session::new();
    assert_eq!(report_stats(&s), None);
    s.accept_tasks("X", sample_tasks()).unwrap();
    s.save_submission(1, None).unwrap();
    assert_eq!(report_stats(&s), None);
  }

  #[test]
  fn progress_level_reflects_saved_tasks() {
    let mut s = Session::new();
    s.accept_tasks("X", sample_tasks()).unwrap();
    s.save_submission(1, None).unwrap();
    s.save_submission(3, None).unwrap();
    s.accept_report(EvaluationReport("ok".into())).unwrap();
    assert_eq!(
      report_stats(&s),
      Some(ReportStats { tasks_analyzed: 2, progress_level: "Task 2/3".into() })
    );

    s.edit_solutions().unwrap();
    s.save_submission(2, None).unwrap();
    s.accept_report(EvaluationReport("ok".into())).unwrap();
    assert_eq!(report_stats(&s).unwrap().progress_level, "Complete");
  }
}
