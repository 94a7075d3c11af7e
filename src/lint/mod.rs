//! Statement lint for migration scripts.
//!
//! Classifies statements by kind so dry runs can show what a script will do
//! and so destructive statements are called out before they execute.
//! Lint never blocks a run.

mod parser;

pub use parser::describe;

use crate::db::DatabaseBackend;
use crate::error::Result;
use crate::migrate::{preview, Script, ScriptCategory, ScriptSource};
use std::fmt;

/// The kind of SQL statement detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Create,
    Alter,
    Insert,
    Update,
    Delete,
    Drop,
    Truncate,
    Select,
    Set,
    Use,
    Other,
}

impl StatementKind {
    /// Returns true for statements that remove data.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Delete | Self::Drop | Self::Truncate)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Select => "SELECT",
            Self::Set => "SET",
            Self::Use => "USE",
            Self::Other => "OTHER",
        };
        f.pad(name)
    }
}

/// Classification of a single statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementInfo {
    pub kind: StatementKind,
    /// False when the dialect parser rejected the text and the kind came
    /// from the leading keyword.
    pub parsed: bool,
}

/// A lint finding for one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintWarning {
    /// Zero-based statement position.
    pub index: usize,
    pub message: String,
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement {}: {}", self.index + 1, self.message)
    }
}

/// Flags destructive statements. They re-run on every migration, so in any
/// script category they discard data that earlier runs created.
pub fn lint_script(
    backend: DatabaseBackend,
    category: ScriptCategory,
    script: &Script,
) -> Vec<LintWarning> {
    script
        .statements
        .iter()
        .enumerate()
        .filter_map(|(index, sql)| {
            let info = describe(backend, sql);
            info.kind.is_destructive().then(|| LintWarning {
                index,
                message: format!(
                    "{} in {} script runs on every migration: {}",
                    info.kind,
                    category,
                    preview(sql)
                ),
            })
        })
        .collect()
}

/// A statement as it would be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStatement {
    pub preview: String,
    pub info: StatementInfo,
}

/// What a dry run reports for one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPlan {
    pub source: ScriptSource,
    pub statements: Vec<PlannedStatement>,
    pub warnings: Vec<LintWarning>,
}

/// Loads and classifies scripts without touching a database.
pub async fn plan(backend: DatabaseBackend, sources: &[ScriptSource]) -> Result<Vec<ScriptPlan>> {
    let mut plans = Vec::with_capacity(sources.len());

    for source in sources {
        let script = Script::load(backend, &source.path).await?;
        let statements = script
            .statements
            .iter()
            .map(|sql| PlannedStatement {
                preview: preview(sql),
                info: describe(backend, sql),
            })
            .collect();
        let warnings = lint_script(backend, source.kind.category(), &script);

        plans.push(ScriptPlan {
            source: source.clone(),
            statements,
            warnings,
        });
    }

    Ok(plans)
}
