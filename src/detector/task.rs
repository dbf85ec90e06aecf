//! Supervision tasks and their string form

use crate::error::{NirejectError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supervision regime of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    Unsupervised,
    SemiSupervised,
    Supervised,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Unsupervised => "unsupervised",
            Task::SemiSupervised => "semi-supervised",
            Task::Supervised => "supervised",
        }
    }
}

/// A task plus an optional training-variant suffix, as in
/// `unsupervised-t` or `supervised-i`.
///
/// The suffix is carried as an opaque tag; scoring does not depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task: Task,
    pub variant: Option<String>,
}

impl TaskSpec {
    pub fn new(task: Task) -> Self {
        Self { task, variant: None }
    }
}

impl FromStr for TaskSpec {
    type Err = NirejectError;

    fn from_str(s: &str) -> Result<Self> {
        for task in [Task::SemiSupervised, Task::Unsupervised, Task::Supervised] {
            let Some(rest) = s.strip_prefix(task.as_str()) else {
                continue;
            };
            if rest.is_empty() {
                return Ok(TaskSpec::new(task));
            }
            if let Some(variant) = rest.strip_prefix('-').filter(|v| !v.is_empty()) {
                return Ok(TaskSpec {
                    task,
                    variant: Some(variant.to_string()),
                });
            }
        }
        Err(NirejectError::Validation(format!(
            "'{}' is not a supported task.",
            s
        )))
    }
}

impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}-{}", self.task.as_str(), variant),
            None => f.write_str(self.task.as_str()),
        }
    }
}
