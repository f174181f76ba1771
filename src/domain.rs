//! Domain models used by the backend: task levels, tasks, submissions, the evaluation report
//! and the workflow step.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of tasks produced by one generation call (and of submission slots).
pub const TASK_COUNT: usize = 3;

/// Difficulty level of a generated task. Position in the task list always matches the level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
  /// Guided application of what the tutorial showed.
  Guided,
  /// Independent application, no hints.
  Independent,
  /// Design-oriented task with deliberate ambiguity.
  Design,
}

impl Level {
  pub const ALL: [Level; TASK_COUNT] = [Level::Guided, Level::Independent, Level::Design];

  /// Only 1, 2 and 3 are levels; everything else is rejected.
  pub fn from_number(n: u32) -> Option<Self> {
    match n {
      1 => Some(Level::Guided),
      2 => Some(Level::Independent),
      3 => Some(Level::Design),
      _ => None,
    }
  }

  pub fn number(self) -> u8 {
    match self {
      Level::Guided => 1,
      Level::Independent => 2,
      Level::Design => 3,
    }
  }

  /// Intensity marker shown next to the task (low / medium / high).
  pub fn marker(self) -> &'static str {
    match self {
      Level::Guided => "🟢",
      Level::Independent => "🟡",
      Level::Design => "🔴",
    }
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.number())
  }
}

/// One generated coding exercise. Only the parser creates these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub level: Level,
  pub title: String,
  pub description: String,
}

impl Task {
  pub fn marker(&self) -> &'static str {
    self.level.marker()
  }
}

/// The user's code for one task slot plus whether it was explicitly saved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
  pub code: String,
  pub saved: bool,
}

/// Markdown produced by the evaluation call, passed through unmodified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationReport(pub String);

impl EvaluationReport {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Which stage of the workflow is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
  /// 1: collecting the transcript.
  Transcript,
  /// 2: editing and saving solutions.
  Solutions,
  /// 3: reviewing the evaluation.
  Evaluation,
}

impl Step {
  pub fn number(self) -> u8 {
    match self {
      Step::Transcript => 1,
      Step::Solutions => 2,
      Step::Evaluation => 3,
    }
  }
}
