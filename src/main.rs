//! storefront-migrate - idempotent schema and seed migrations for the PC store.

mod cli;
mod logging;

use cli::Cli;
use storefront_migrate::config::{Config, ConnectionConfig};
use storefront_migrate::db;
use storefront_migrate::error::Result;
use storefront_migrate::inspect;
use storefront_migrate::lint;
use storefront_migrate::migrate::{MigrationRunner, RunOptions, ScriptSource};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration file
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let env = ConnectionConfig::from_env_with(|key| std::env::var(key).ok())?;
    let connection =
        config.resolve_connection(cli.connection_name(), env, &cli.to_connection_config()?)?;

    // Config file scripts first, then command-line scripts
    let mut scripts = config.script_sources()?;
    scripts.extend(cli.scripts.iter().cloned());

    if cli.dry_run {
        return dry_run(&connection, &scripts).await;
    }

    if scripts.is_empty() && !cli.inspect {
        warn!("No scripts to apply");
        println!("Nothing to do. Pass scripts as schema:PATH, seed:PATH or add-column:TABLE.COLUMN:PATH.");
        return Ok(());
    }

    info!("Connection: {}", connection.display_string());

    if !scripts.is_empty() {
        let client = db::connect(&connection).await?;
        let runner = MigrationRunner::new(RunOptions::from_connection(&connection));
        let report = runner.run_scoped(client, &scripts).await?.into_result()?;

        println!(
            "Migration completed successfully: {} statements applied, {} skipped, {} scripts already applied.",
            report.applied_count(),
            report.skipped_count(),
            report.skipped_scripts()
        );
    }

    if cli.inspect {
        let mut client = db::connect(&connection).await?;
        let result = inspect::inspect(client.as_mut()).await;
        if let Err(e) = client.close().await {
            warn!("Failed to close database connection: {}", e);
        }
        print!("{}", inspect::render(&result?));
    }

    Ok(())
}

/// Prints what each script would execute without connecting.
async fn dry_run(connection: &ConnectionConfig, scripts: &[ScriptSource]) -> Result<()> {
    let plans = lint::plan(connection.backend(), scripts).await?;

    for plan in &plans {
        println!(
            "{} ({}, {} statements)",
            plan.source.path.display(),
            plan.source.kind.category(),
            plan.statements.len()
        );
        for (index, statement) in plan.statements.iter().enumerate() {
            let marker = if statement.info.parsed { "" } else { " ?" };
            println!(
                "  {:>3}. {:<8}{} {}",
                index + 1,
                statement.info.kind,
                marker,
                statement.preview
            );
        }
        for warning in &plan.warnings {
            println!("  warning: {warning}");
        }
    }

    Ok(())
}
