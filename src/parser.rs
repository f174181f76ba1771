//! Task parser: turns the model's free-form generation reply into exactly three tasks.
//!
//! Expected shape (one block per level, in order):
//!
//! ```text
//! TASK 1:
//! Title: ...
//! Description: ...
//!
//! TASK 2:
//! ...
//! ```
//!
//! Block markers are anchored at line starts (markdown emphasis such as `**TASK 1:**` and list
//! bullets are tolerated). Anything before the first marker is ignored. Every block is validated before
//! any `Task` is built, so a reply either yields three well-formed tasks or a `ParseError`.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::domain::{Level, Task, TASK_COUNT};

static BLOCK_MARKER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?m)^[ \t>#*_-]*TASK[ \t]+([^\s:*_]+)[ \t*_]*:[*_]*").expect("block marker regex")
});

static TITLE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[\s>#*_-]*Title[ \t*_]*:[*_]*\s*(.*)$").expect("title regex")
});

static DESCRIPTION_FIELD: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[\s>#*_-]*Description[ \t*_]*:[*_]*\s*(.*)$").expect("description regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("no `TASK {0}:` block in model output")]
  MissingBlock(u8),
  #[error("expected 3 task blocks, found {0}")]
  UnexpectedBlockCount(usize),
  #[error("task marker `{0}` is not a level between 1 and 3")]
  InvalidLevel(String),
  #[error("task blocks out of order: expected TASK {expected}, found TASK {found}")]
  OutOfOrder { expected: u8, found: u8 },
  #[error("TASK {0} has no title")]
  MissingTitle(u8),
  #[error("TASK {0} has no description")]
  MissingDescription(u8),
}

/// Parse a generation reply into three tasks, levels 1..=3 in order.
pub fn parse_tasks(content: &str) -> Result<[Task; TASK_COUNT], ParseError> {
  let markers: Vec<_> = BLOCK_MARKER.captures_iter(content).collect();
  if markers.len() > TASK_COUNT {
    return Err(ParseError::UnexpectedBlockCount(markers.len()));
  }

  let mut tasks = Vec::with_capacity(TASK_COUNT);
  for (i, caps) in markers.iter().enumerate() {
    let expected = Level::ALL[i];
    let level = parse_level(&caps[1])?;
    if level != expected {
      return Err(ParseError::OutOfOrder { expected: expected.number(), found: level.number() });
    }

    let whole = caps.get(0).map(|m| m.end()).unwrap_or_default();
    let end = markers.get(i + 1).and_then(|next| next.get(0)).map(|m| m.start()).unwrap_or(content.len());
    tasks.push(parse_block(level, &content[whole..end])?);
  }

  let found = tasks.len();
  tasks
    .try_into()
    .map_err(|_: Vec<Task>| ParseError::MissingBlock(found as u8 + 1))
}

/// Level token must be a bare number 1..=3; multi-digit or non-numeric text fails closed.
fn parse_level(token: &str) -> Result<Level, ParseError> {
  if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
    return Err(ParseError::InvalidLevel(token.to_string()));
  }
  token
    .parse::<u32>()
    .ok()
    .and_then(Level::from_number)
    .ok_or_else(|| ParseError::InvalidLevel(token.to_string()))
}

fn parse_block(level: Level, body: &str) -> Result<Task, ParseError> {
  let lines: Vec<&str> = body.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

  let title_at = lines.iter().position(|l| TITLE_FIELD.is_match(l));
  let desc_at = lines.iter().position(|l| DESCRIPTION_FIELD.is_match(l));

  let title_at = title_at.ok_or(ParseError::MissingTitle(level.number()))?;
  let desc_at = match desc_at {
    Some(d) if d > title_at => d,
    _ => return Err(ParseError::MissingDescription(level.number())),
  };

  // An empty `Title:` line means the title wrapped onto the following lines. Otherwise any
  // lines before `Description:` belong to the description.
  let inline = field_value(&TITLE_FIELD, lines[title_at]);
  let between = &lines[title_at + 1..desc_at];
  let (title, lead) = if inline.is_empty() {
    (between.join(" "), &[][..])
  } else {
    (inline.to_string(), between)
  };
  let title = title.trim().to_string();
  if title.is_empty() {
    return Err(ParseError::MissingTitle(level.number()));
  }

  let mut description = lead.to_vec();
  description.push(field_value(&DESCRIPTION_FIELD, lines[desc_at]));
  description.extend_from_slice(&lines[desc_at + 1..]);
  description.retain(|l| !l.is_empty());
  let description = description.join("\n").trim().to_string();
  if description.is_empty() {
    return Err(ParseError::MissingDescription(level.number()));
  }

  Ok(Task { level, title, description })
}

fn field_value<'a>(re: &Regex, line: &'a str) -> &'a str {
  re.captures(line)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().trim().trim_matches('*').trim())
    .unwrap_or_default()
}
