//! Outcome types produced by a migration run.

use super::script::ScriptCategory;
use crate::error::{MigrateError, Result, SqlError};
use std::fmt;
use std::path::PathBuf;

/// Outcome of one statement (or one batch in batch mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Applied,
    /// The server reported an error from the ignorable set.
    SkippedIgnorable(String),
    Failed(SqlError),
}

impl ExecutionResult {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::SkippedIgnorable(_))
    }
}

/// A statement's position, preview and outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementOutcome {
    /// Zero-based position in the script.
    pub index: usize,
    pub preview: String,
    pub result: ExecutionResult,
}

/// Everything that happened to one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReport {
    pub path: PathBuf,
    pub category: ScriptCategory,
    /// Set when the whole script was skipped by the add-column pre-check.
    pub skipped: Option<String>,
    pub statements: Vec<StatementOutcome>,
}

impl ScriptReport {
    pub fn new(path: impl Into<PathBuf>, category: ScriptCategory) -> Self {
        Self {
            path: path.into(),
            category,
            skipped: None,
            statements: Vec::new(),
        }
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Ordered script reports plus the overall status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub scripts: Vec<ScriptReport>,
    pub status: RunStatus,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Every statement outcome across all scripts, in execution order.
    pub fn results(&self) -> impl Iterator<Item = &ExecutionResult> + '_ {
        self.scripts
            .iter()
            .flat_map(|script| script.statements.iter().map(|s| &s.result))
    }

    pub fn applied_count(&self) -> usize {
        self.results()
            .filter(|r| matches!(r, ExecutionResult::Applied))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results().filter(|r| r.is_skipped()).count()
    }

    /// Scripts skipped whole by the add-column pre-check.
    pub fn skipped_scripts(&self) -> usize {
        self.scripts.iter().filter(|s| s.skipped.is_some()).count()
    }

    /// The error that aborted the run, if any.
    pub fn failure(&self) -> Option<&SqlError> {
        self.results().find_map(|r| match r {
            ExecutionResult::Failed(err) => Some(err),
            _ => None,
        })
    }

    /// Converts an aborted report into the fatal error that stopped it.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        match self.failure() {
            Some(err) => Err(MigrateError::Sql(err.clone())),
            None => Err(MigrateError::internal(
                "run aborted without a recorded failure",
            )),
        }
    }
}
