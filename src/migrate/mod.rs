//! Idempotent schema and seed migrations.
//!
//! Scripts are plain SQL files. Each is split into statements and applied in
//! order; failures meaning "already applied" are skipped, anything else
//! aborts the run.

mod classify;
mod report;
mod runner;
mod script;

pub use classify::{CodeTable, Disposition, ErrorClassifier};
pub use report::{ExecutionResult, RunReport, RunStatus, ScriptReport, StatementOutcome};
pub use runner::{ExecutionMode, MigrationRunner, RunOptions};
pub use script::{
    preview, split_statements, ColumnTarget, Script, ScriptCategory, ScriptKind, ScriptSource,
};
