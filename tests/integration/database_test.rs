//! Live database tests.
//!
//! Each test creates uniquely named tables and drops them afterwards so the
//! suite can share a database with other runs.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use storefront_migrate::config::ConnectionConfig;
use storefront_migrate::db::{self, DatabaseBackend, DatabaseClient};
use storefront_migrate::error::MigrateError;
use storefront_migrate::migrate::{ColumnTarget, MigrationRunner, RunStatus, ScriptSource};
use tempfile::TempDir;

/// Helper to get test database config from environment.
fn get_test_config() -> Option<ConnectionConfig> {
    let url = std::env::var("DATABASE_URL").ok()?;
    ConnectionConfig::from_connection_string(&url).ok()
}

/// A table name no other test run uses.
fn unique_table(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{prefix}_{}_{nanos}", std::process::id())
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

async fn drop_table(config: &ConnectionConfig, table: &str) {
    if let Ok(mut client) = db::connect(config).await {
        let _ = client.execute_raw(&format!("DROP TABLE IF EXISTS {table}")).await;
        let _ = client.close().await;
    }
}

#[tokio::test]
async fn test_schema_and_seed_rerun() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let table = unique_table("sfm_products");
    let dir = TempDir::new().unwrap();
    let scripts = vec![
        ScriptSource::schema(write(
            &dir,
            "schema.sql",
            &format!("CREATE TABLE {table} (id INT PRIMARY KEY, name VARCHAR(100));"),
        )),
        ScriptSource::seed(write(
            &dir,
            "seed.sql",
            &format!(
                "INSERT INTO {table} (id, name) VALUES (1, 'Ryzen 5');\n\
                 INSERT INTO {table} (id, name) VALUES (2, 'Core i5; 14th gen');"
            ),
        )),
    ];
    let runner = MigrationRunner::default();

    let first = runner
        .run_scoped(db::connect(&config).await.unwrap(), &scripts)
        .await
        .unwrap();
    let second = runner
        .run_scoped(db::connect(&config).await.unwrap(), &scripts)
        .await
        .unwrap();

    drop_table(&config, &table).await;

    assert_eq!(first.status, RunStatus::Success);
    assert_eq!(first.applied_count(), 3);
    assert_eq!(second.status, RunStatus::Success);
    assert_eq!(second.applied_count(), 0);
    assert_eq!(second.skipped_count(), 3);
}

#[tokio::test]
async fn test_syntax_error_aborts() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let table = unique_table("sfm_sentinel");
    let dir = TempDir::new().unwrap();
    let scripts = vec![ScriptSource::schema(write(
        &dir,
        "schema.sql",
        &format!("CREAT TABLE broken (id INT);\nCREATE TABLE {table} (id INT);"),
    ))];

    let report = MigrationRunner::default()
        .run_scoped(db::connect(&config).await.unwrap(), &scripts)
        .await
        .unwrap();

    let mut client = db::connect(&config).await.unwrap();
    let tables = client.list_tables().await.unwrap();
    client.close().await.unwrap();
    drop_table(&config, &table).await;

    assert_eq!(report.status, RunStatus::Aborted);
    let expected_code = match config.backend() {
        DatabaseBackend::MySql => "1064",
        DatabaseBackend::Postgres => "42601",
    };
    assert_eq!(
        report.failure().and_then(|e| e.code.as_deref()),
        Some(expected_code)
    );
    assert!(!tables.contains(&table));
}

#[tokio::test]
async fn test_add_column_precheck() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let table = unique_table("sfm_orders");
    let dir = TempDir::new().unwrap();
    let target = ColumnTarget::new(&table, "shipping_address").unwrap();
    let scripts = vec![
        ScriptSource::schema(write(
            &dir,
            "schema.sql",
            &format!("CREATE TABLE {table} (id INT PRIMARY KEY);"),
        )),
        ScriptSource::add_column(
            write(
                &dir,
                "add_shipping.sql",
                &format!("ALTER TABLE {table} ADD COLUMN shipping_address VARCHAR(255);"),
            ),
            target,
        ),
    ];
    let runner = MigrationRunner::default();

    let first = runner
        .run_scoped(db::connect(&config).await.unwrap(), &scripts)
        .await
        .unwrap();
    let second = runner
        .run_scoped(db::connect(&config).await.unwrap(), &scripts)
        .await
        .unwrap();

    drop_table(&config, &table).await;

    assert_eq!(first.applied_count(), 2);
    assert_eq!(first.skipped_scripts(), 0);
    assert!(second.is_success());
    assert_eq!(second.skipped_scripts(), 1);
}

#[tokio::test]
async fn test_count_rows_and_column_exists() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let table = unique_table("sfm_count");
    let mut client = db::connect(&config).await.unwrap();
    client
        .execute_raw(&format!("CREATE TABLE {table} (id INT)"))
        .await
        .unwrap();
    client
        .execute_raw(&format!("INSERT INTO {table} (id) VALUES (1), (2), (3)"))
        .await
        .unwrap();

    let count = client.count_rows(&table).await;
    let has_id = client.column_exists(&table, "id").await;
    let has_price = client.column_exists(&table, "price").await;
    client.close().await.unwrap();
    drop_table(&config, &table).await;

    assert_eq!(count.unwrap(), 3);
    assert!(has_id.unwrap());
    assert!(!has_price.unwrap());
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_host() {
    let config = ConnectionConfig {
        host: Some("invalid.host.that.does.not.exist.local".to_string()),
        connect_timeout: Some(2),
        ..Default::default()
    };

    let result = db::connect(&config).await;

    assert!(matches!(result, Err(MigrateError::Connection(_))));
}
