//! The migration runner.
//!
//! Applies scripts in order, one statement at a time, and stops at the first
//! failure the classifier does not consider ignorable. Nothing is rolled
//! back: every statement commits on its own.

use super::classify::{CodeTable, Disposition, ErrorClassifier};
use super::report::{ExecutionResult, RunReport, RunStatus, ScriptReport, StatementOutcome};
use super::script::{preview, Script, ScriptKind, ScriptSource};
use crate::config::ConnectionConfig;
use crate::db::DatabaseClient;
use crate::error::Result;
use crate::lint;
use tracing::{debug, error, info, warn};

/// How statements are submitted to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One call per statement.
    #[default]
    PerStatement,
    /// One multi-statement call per script.
    Batch,
}

/// Options resolved from configuration before the run starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: ExecutionMode,
}

impl RunOptions {
    pub fn from_connection(config: &ConnectionConfig) -> Self {
        let mode = if config.multiple_statements() {
            ExecutionMode::Batch
        } else {
            ExecutionMode::PerStatement
        };
        Self { mode }
    }
}

/// Applies schema, seed and add-column scripts.
pub struct MigrationRunner {
    classifier: Box<dyn ErrorClassifier>,
    options: RunOptions,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new(RunOptions::default())
    }
}

impl MigrationRunner {
    /// Creates a runner using the built-in ignorable-error table.
    pub fn new(options: RunOptions) -> Self {
        Self::with_classifier(options, CodeTable::builtin())
    }

    pub fn with_classifier(options: RunOptions, classifier: impl ErrorClassifier + 'static) -> Self {
        Self {
            classifier: Box::new(classifier),
            options,
        }
    }

    /// Runs the scripts, then closes the client whatever the outcome.
    ///
    /// The client is closed exactly once: after a completed run, after an
    /// aborted run, and when a script file cannot be read.
    pub async fn run_scoped(
        &self,
        mut client: Box<dyn DatabaseClient>,
        scripts: &[ScriptSource],
    ) -> Result<RunReport> {
        let result = self.run(client.as_mut(), scripts).await;

        if let Err(e) = client.close().await {
            warn!("Failed to close database connection: {}", e);
        }

        result
    }

    /// Runs the scripts in order against an open client.
    ///
    /// Returns `Err` only when a script cannot be read. A fatal SQL error
    /// yields `Ok` with status `Aborted` and the failure recorded last.
    pub async fn run(
        &self,
        client: &mut dyn DatabaseClient,
        scripts: &[ScriptSource],
    ) -> Result<RunReport> {
        let mut reports = Vec::with_capacity(scripts.len());

        for source in scripts {
            info!(
                "Applying {} script {}",
                source.kind.category(),
                source.path.display()
            );

            let script = Script::load(client.backend(), &source.path).await?;
            for warning in lint::lint_script(client.backend(), source.kind.category(), &script) {
                warn!("{}: {}", source.path.display(), warning);
            }

            let mut report = ScriptReport::new(&source.path, source.kind.category());
            let status = self.apply_script(client, source, &script, &mut report).await;
            reports.push(report);

            if status == RunStatus::Aborted {
                error!("Migration {} in {}", status, source.path.display());
                return Ok(RunReport {
                    scripts: reports,
                    status,
                });
            }
        }

        let report = RunReport {
            scripts: reports,
            status: RunStatus::Success,
        };
        info!(
            "Migration finished with {}: {} applied, {} skipped, {} scripts skipped",
            report.status,
            report.applied_count(),
            report.skipped_count(),
            report.skipped_scripts()
        );
        Ok(report)
    }

    async fn apply_script(
        &self,
        client: &mut dyn DatabaseClient,
        source: &ScriptSource,
        script: &Script,
        report: &mut ScriptReport,
    ) -> RunStatus {
        if let ScriptKind::AddColumn(target) = &source.kind {
            match client.column_exists(&target.table, &target.column).await {
                Ok(true) => {
                    info!(
                        "Column {} already exists, skipping {}",
                        target,
                        source.path.display()
                    );
                    report.skipped = Some(format!("column {target} already exists"));
                    return RunStatus::Success;
                }
                Ok(false) => debug!("Column {} missing, applying script", target),
                Err(err) => {
                    error!("Column check for {} failed: {}", target, err);
                    report.statements.push(StatementOutcome {
                        index: 0,
                        preview: format!("column check {target}"),
                        result: ExecutionResult::Failed(err),
                    });
                    return RunStatus::Aborted;
                }
            }
        }

        let batch_text;
        let units: Vec<&str> = match self.options.mode {
            ExecutionMode::PerStatement => script.statements.iter().map(String::as_str).collect(),
            ExecutionMode::Batch if script.is_empty() => Vec::new(),
            ExecutionMode::Batch => {
                batch_text = script.statements.join(";\n");
                vec![batch_text.as_str()]
            }
        };

        let category = source.kind.category();
        let total = units.len();

        for (index, sql) in units.into_iter().enumerate() {
            let preview = preview(sql);
            info!("[{}/{}] {}", index + 1, total, preview);

            let result = match client.execute_raw(sql).await {
                Ok(()) => ExecutionResult::Applied,
                Err(err) => match self.classifier.classify(category, &err) {
                    Disposition::Ignorable(reason) => {
                        warn!("Skipped ({}): {}", reason, err);
                        ExecutionResult::SkippedIgnorable(reason)
                    }
                    Disposition::Fatal => {
                        error!("Statement {} failed: {}", index + 1, err);
                        ExecutionResult::Failed(err)
                    }
                },
            };

            let failed = matches!(result, ExecutionResult::Failed(_));
            report.statements.push(StatementOutcome {
                index,
                preview,
                result,
            });

            if failed {
                return RunStatus::Aborted;
            }
        }

        RunStatus::Success
    }
}
