//! Session workflow: the three-step state machine behind the UI.
//!
//! `Session` owns every entity of one user session (transcript, tasks, submissions, report).
//! All transitions here are synchronous and side-effect free; the network calls that drive
//! the generation and evaluation transitions live in `logic`, which only applies
//! `accept_tasks` / `accept_report` after the upstream call (and parsing) succeeded.
//!
//! Lock and feedback flags are derived from the stored entities rather than kept alongside
//! them, so "locked implies three tasks" and "feedback implies a saved submission" hold by
//! construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{EvaluationReport, Step, Submission, Task, TASK_COUNT};

/// Guard failures. These are user-facing warnings; a failed guard never mutates the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Please paste a transcript first.")]
    EmptyTranscript,
    #[error("The transcript is locked. Start over to use a new one.")]
    TranscriptLocked,
    #[error("Generate tasks from a transcript first.")]
    NoTasks,
    #[error("Please complete and save at least one task first.")]
    NoSavedSubmission,
    #[error("Task {0} does not exist; tasks are numbered 1 to 3.")]
    InvalidTask(usize),
    #[error("There is no evaluation to leave yet.")]
    NotReviewing,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    transcript: String,
    tasks: Option<[Task; TASK_COUNT]>,
    submissions: [Submission; TASK_COUNT],
    report: Option<EvaluationReport>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.as_ref().map(|t| t.as_slice()).unwrap_or(&[])
    }

    pub fn submissions(&self) -> &[Submission; TASK_COUNT] {
        &self.submissions
    }

    pub fn report(&self) -> Option<&EvaluationReport> {
        self.report.as_ref()
    }

    pub fn transcript_locked(&self) -> bool {
        self.tasks.is_some()
    }

    pub fn has_feedback(&self) -> bool {
        self.report.is_some()
    }

    pub fn submitted_flags(&self) -> [bool; TASK_COUNT] {
        [self.submissions[0].saved, self.submissions[1].saved, self.submissions[2].saved]
    }

    pub fn saved_count(&self) -> usize {
        self.submissions.iter().filter(|s| s.saved).count()
    }

    /// Furthest stage reached, rewound by `edit_solutions` / `try_new_tasks` / `reset`.
    pub fn step(&self) -> Step {
        if self.report.is_some() {
            Step::Evaluation
        } else if self.tasks.is_some() {
            Step::Solutions
        } else {
            Step::Transcript
        }
    }

    /// Guard for 1 -> 2. Must pass before any generation call is issued.
    pub fn check_generation(&self, transcript: &str) -> Result<(), WorkflowError> {
        if self.transcript_locked() {
            return Err(WorkflowError::TranscriptLocked);
        }
        if transcript.trim().is_empty() {
            return Err(WorkflowError::EmptyTranscript);
        }
        Ok(())
    }

    /// 1 -> 2: lock the transcript and store the parsed tasks.
    pub fn accept_tasks(&mut self, transcript: &str, tasks: [Task; TASK_COUNT]) -> Result<(), WorkflowError> {
        self.check_generation(transcript)?;
        self.transcript = transcript.to_string();
        self.tasks = Some(tasks);
        debug!(target: "workflow", step = 2, "Transcript locked, tasks stored");
        Ok(())
    }

    fn slot(&self, task: usize) -> Result<usize, WorkflowError> {
        if self.tasks.is_none() {
            return Err(WorkflowError::NoTasks);
        }
        match task {
            1..=TASK_COUNT => Ok(task - 1),
            _ => Err(WorkflowError::InvalidTask(task)),
        }
    }

    /// Replace the code for task `task` (1-based). The saved flag is left as is.
    pub fn edit_submission(&mut self, task: usize, code: String) -> Result<(), WorkflowError> {
        let i = self.slot(task)?;
        self.submissions[i].code = code;
        Ok(())
    }

    /// Explicit save for task `task` (1-based), optionally replacing the code first.
    pub fn save_submission(&mut self, task: usize, code: Option<String>) -> Result<(), WorkflowError> {
        let i = self.slot(task)?;
        if let Some(code) = code {
            self.submissions[i].code = code;
        }
        self.submissions[i].saved = true;
        debug!(target: "workflow", task, "Submission saved");
        Ok(())
    }

    /// Guard for 2 -> 3. Returns the current code of all three slots, saved or not.
    pub fn check_evaluation(&self) -> Result<[String; TASK_COUNT], WorkflowError> {
        if self.tasks.is_none() {
            return Err(WorkflowError::NoTasks);
        }
        if self.saved_count() == 0 {
            return Err(WorkflowError::NoSavedSubmission);
        }
        Ok(self.submissions.clone().map(|s| s.code))
    }

    /// 2 -> 3: store the report.
    pub fn accept_report(&mut self, report: EvaluationReport) -> Result<(), WorkflowError> {
        self.check_evaluation()?;
        self.report = Some(report);
        debug!(target: "workflow", step = 3, "Evaluation report stored");
        Ok(())
    }

    /// 3 -> 2: drop the report, keep submissions.
    pub fn edit_solutions(&mut self) -> Result<(), WorkflowError> {
        if self.report.take().is_none() {
            return Err(WorkflowError::NotReviewing);
        }
        debug!(target: "workflow", step = 2, "Back to editing solutions");
        Ok(())
    }

    /// 3 -> 1: soft reset. Clears tasks, submissions, report and the transcript lock.
    pub fn try_new_tasks(&mut self) -> Result<(), WorkflowError> {
        if self.report.is_none() {
            return Err(WorkflowError::NotReviewing);
        }
        *self = Self::new();
        debug!(target: "workflow", step = 1, "Starting over with new tasks");
        Ok(())
    }

    /// Any -> 1, unconditionally.
    pub fn reset(&mut self) {
        *self = Self::new();
        debug!(target: "workflow", step = 1, "Session reset");
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView::of(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepBadge {
    Active,
    Completed,
    Pending,
}

/// Read-only projection consumed by the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    pub step: u8,
    pub transcript_locked: bool,
    pub submitted: [bool; TASK_COUNT],
    pub has_feedback: bool,
    pub tasks_generated: usize,
    pub tasks_completed: usize,
    pub progress_percent: u8,
    pub badges: [StepBadge; 3],
}

impl WorkflowView {
    fn of(s: &Session) -> Self {
        let step = s.step();
        let submitted = s.submitted_flags();
        let badge = |this: Step, done: bool| {
            if step == this {
                StepBadge::Active
            } else if done {
                StepBadge::Completed
            } else {
                StepBadge::Pending
            }
        };

        let progress = 25 * (s.transcript_locked() as usize + s.saved_count());
        Self {
            step: step.number(),
            transcript_locked: s.transcript_locked(),
            submitted,
            has_feedback: s.has_feedback(),
            tasks_generated: s.tasks().len(),
            tasks_completed: s.saved_count(),
            progress_percent: progress.min(100) as u8,
            badges: [
                badge(Step::Transcript, s.transcript_locked()),
                badge(Step::Solutions, submitted.iter().any(|b| *b)),
                badge(Step::Evaluation, s.has_feedback()),
            ],
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::Level;

    pub(crate) fn sample_tasks() -> [Task; TASK_COUNT] {
        Level::ALL.map(|level| Task {
            level,
            title: format!("Task title {level}"),
            description: format!("Do the level {level} thing."),
        })
    }

    fn assert_invariants(s: &Session) {
        let v = s.view();
        if v.transcript_locked {
            assert_eq!(s.tasks().len(), 3);
        }
        if v.has_feedback {
            assert!(v.submitted.iter().any(|b| *b));
        }
    }

    fn reviewing() -> Session {
        let mut s = Session::new();
        s.accept_tasks("X", sample_tasks()).unwrap();
        s.save_submission(1, Some("print(1)".into())).unwrap();
        s.accept_report(EvaluationReport("## Report".into())).unwrap();
        s
    }

    #[test]
    fn new_session_is_collecting_transcript() {
        let s = Session::new();
        let v = s.view();
        assert_eq!(v.step, 1);
        assert!(!v.transcript_locked && !v.has_feedback);
        assert_eq!(v.badges, [StepBadge::Active, StepBadge::Pending, StepBadge::Pending]);
        assert_eq!(v.progress_percent, 0);
    }

    #[test]
    fn blank_transcript_is_rejected_without_mutation() {
        let mut s = Session::new();
        assert_eq!(s.check_generation("   \n"), Err(WorkflowError::EmptyTranscript));
        assert_eq!(s.accept_tasks("", sample_tasks()), Err(WorkflowError::EmptyTranscript));
        assert_eq!(s, Session::new());
    }

    #[test]
    fn accepting_tasks_locks_transcript() {
        let mut s = Session::new();
        s.accept_tasks("X", sample_tasks()).unwrap();
        assert_eq!(s.step(), Step::Solutions);
        assert!(s.transcript_locked());
        assert_eq!(s.transcript(), "X");
        assert_eq!(s.check_generation("Y"), Err(WorkflowError::TranscriptLocked));
        assert_eq!(s.view().progress_percent, 25);
        assert_invariants(&s);
    }

    #[test]
    fn editing_does_not_mark_saved() {
        let mut s = Session::new();
        s.accept_tasks("X", sample_tasks()).unwrap();
        s.edit_submission(2, "draft".into()).unwrap();
        assert_eq!(s.submissions()[1].code, "draft");
        assert_eq!(s.submitted_flags(), [false, false, false]);
        assert_eq!(s.check_evaluation(), Err(WorkflowError::NoSavedSubmission));
    }

    #[test]
    fn submission_indices_are_one_based_and_bounded() {
        let mut s = Session::new();
        assert_eq!(s.save_submission(1, None), Err(WorkflowError::NoTasks));
        s.accept_tasks("X", sample_tasks()).unwrap();
        assert_eq!(s.save_submission(0, None), Err(WorkflowError::InvalidTask(0)));
        assert_eq!(s.edit_submission(4, String::new()), Err(WorkflowError::InvalidTask(4)));
        s.save_submission(3, None).unwrap();
        assert_eq!(s.submitted_flags(), [false, false, true]);
    }

    #[test]
    fn evaluation_sends_current_code_of_every_slot() {
        let mut s = Session::new();
        s.accept_tasks("X", sample_tasks()).unwrap();
        s.save_submission(1, Some("saved".into())).unwrap();
        s.edit_submission(2, "real work on task 2".into()).unwrap();
        let codes = s.check_evaluation().unwrap();
        assert_eq!(codes, ["saved".to_string(), "real work on task 2".to_string(), String::new()]);
    }

    #[test]
    fn report_moves_to_step_three() {
        let s = reviewing();
        let v = s.view();
        assert_eq!(v.step, 3);
        assert!(v.has_feedback);
        assert_eq!(v.badges, [StepBadge::Completed, StepBadge::Completed, StepBadge::Active]);
        assert_eq!(v.progress_percent, 50);
        assert_invariants(&s);
    }

    #[test]
    fn edit_solutions_keeps_submissions() {
        let mut s = reviewing();
        s.edit_solutions().unwrap();
        assert_eq!(s.step(), Step::Solutions);
        assert!(s.report().is_none());
        assert_eq!(s.submissions()[0].code, "print(1)");
        assert!(s.submissions()[0].saved);
        assert_eq!(s.edit_solutions(), Err(WorkflowError::NotReviewing));
    }

    #[test]
    fn try_new_tasks_clears_everything() {
        let mut s = reviewing();
        s.try_new_tasks().unwrap();
        assert_eq!(s, Session::new());
        assert_eq!(s.step(), Step::Transcript);
    }

    #[test]
    fn try_new_tasks_requires_a_report() {
        let mut s = Session::new();
        s.accept_tasks("X", sample_tasks()).unwrap();
        assert_eq!(s.try_new_tasks(), Err(WorkflowError::NotReviewing));
        assert!(s.transcript_locked());
    }

    #[test]
    fn hard_reset_from_any_state() {
        let mut fresh = Session::new();
        fresh.reset();
        assert_eq!(fresh, Session::new());

        let mut solving = Session::new();
        solving.accept_tasks("X", sample_tasks()).unwrap();
        solving.save_submission(2, Some("code".into())).unwrap();
        solving.reset();
        assert_eq!(solving, Session::new());

        let mut done = reviewing();
        done.reset();
        let v = done.view();
        assert_eq!(v.step, 1);
        assert!(done.tasks().is_empty() && !v.transcript_locked && !v.has_feedback);
        assert_eq!(v.submitted, [false; 3]);
    }

    #[test]
    fn progress_caps_at_one_hundred() {
        let mut s = Session::new();
        s.accept_tasks("X", sample_tasks()).unwrap();
        for task in 1..=3 {
            s.save_submission(task, None).unwrap();
        }
        assert_eq!(s.view().progress_percent, 100);
    }
}
