//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Submission, Task};
use crate::report::{report_stats, ReportStats};
use crate::workflow::{Session, WorkflowView};

/// DTO for one generated task.
#[derive(Debug, Serialize)]
pub struct TaskOut {
    pub level: u8,
    pub marker: &'static str,
    pub title: String,
    pub description: String,
}

impl From<&Task> for TaskOut {
    fn from(t: &Task) -> Self {
        Self {
            level: t.level.number(),
            marker: t.marker(),
            title: t.title.clone(),
            description: t.description.clone(),
        }
    }
}

/// Full snapshot of one session, returned by every session endpoint.
#[derive(Debug, Serialize)]
pub struct SessionOut {
    pub id: String,
    pub view: WorkflowView,
    pub transcript: String,
    pub tasks: Vec<TaskOut>,
    pub submissions: Vec<Submission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_stats: Option<ReportStats>,
}

impl SessionOut {
    pub fn of(id: &str, s: &Session) -> Self {
        Self {
            id: id.to_string(),
            view: s.view(),
            transcript: s.transcript().to_string(),
            tasks: s.tasks().iter().map(TaskOut::from).collect(),
            submissions: s.submissions().to_vec(),
            report: s.report().map(|r| r.as_str().to_string()),
            report_stats: report_stats(s),
        }
    }
}

//
// HTTP request DTOs
//

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    pub transcript: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeIn {
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveIn {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
