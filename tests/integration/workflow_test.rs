//! End-to-end migration workflow tests.
//!
//! Runs the store's schema, seed and add-column scripts through the public
//! API against the in-memory client.

use std::path::{Path, PathBuf};
use storefront_migrate::db::MockDatabaseClient;
use storefront_migrate::inspect;
use storefront_migrate::lint::{self, StatementKind};
use storefront_migrate::migrate::{
    ColumnTarget, ExecutionResult, MigrationRunner, RunStatus, ScriptSource,
};
use tempfile::TempDir;

const SCHEMA: &str = r#"
-- PC store schema
CREATE DATABASE IF NOT EXISTS pc_store;
USE pc_store;

CREATE TABLE categories (
    id INT PRIMARY KEY,
    name VARCHAR(50) NOT NULL
);

/* Products reference a category */
CREATE TABLE products (
    id INT PRIMARY KEY,
    category_id INT NOT NULL,
    name VARCHAR(100) NOT NULL,
    description TEXT,
    price DECIMAL(10, 2) NOT NULL,
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE orders (
    id INT PRIMARY KEY,
    customer_email VARCHAR(255) NOT NULL
);
"#;

const SEED: &str = r#"
INSERT INTO categories (id, name) VALUES (1, 'Processors');
INSERT INTO categories (id, name) VALUES (2, 'Graphics Cards');
INSERT INTO products (id, category_id, name, description, price)
    VALUES (1, 1, 'Ryzen 7 7800X3D', 'Gaming CPU; 8 cores', 449.00);
INSERT INTO products (id, category_id, name, description, price)
    VALUES (2, 2, 'RTX 4070', 'It''s fast', 599.00);
"#;

const ADD_COLUMN: &str = "ALTER TABLE orders ADD COLUMN shipping_address VARCHAR(255);\n";

struct StoreScripts {
    _dir: TempDir,
    sources: Vec<ScriptSource>,
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn store_scripts() -> StoreScripts {
    let dir = TempDir::new().unwrap();
    let target = ColumnTarget::new("orders", "shipping_address").unwrap();
    let sources = vec![
        ScriptSource::schema(write(dir.path(), "schema.sql", SCHEMA)),
        ScriptSource::seed(write(dir.path(), "seed.sql", SEED)),
        ScriptSource::add_column(write(dir.path(), "add_shipping.sql", ADD_COLUMN), target),
    ];
    StoreScripts { _dir: dir, sources }
}

#[tokio::test]
async fn test_first_run_applies_everything() {
    let scripts = store_scripts();
    let client = MockDatabaseClient::new();
    let handle = client.handle();

    let report = MigrationRunner::default()
        .run_scoped(Box::new(client), &scripts.sources)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Success);
    // 5 schema statements, 4 inserts, 1 alter
    assert_eq!(report.applied_count(), 10);
    assert_eq!(report.skipped_count(), 0);
    assert_eq!(handle.row_count("products"), 2);
    assert!(handle.has_column("orders", "shipping_address"));
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let scripts = store_scripts();
    let client = MockDatabaseClient::new();
    let handle = client.handle();
    let runner = MigrationRunner::default();

    runner
        .run_scoped(Box::new(client), &scripts.sources)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let report = runner
        .run_scoped(Box::new(handle.connect()), &scripts.sources)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    // CREATE DATABASE IF NOT EXISTS and USE still apply
    assert_eq!(report.applied_count(), 2);
    assert_eq!(report.skipped_count(), 7);
    assert_eq!(report.skipped_scripts(), 1);
    assert!(report
        .results()
        .all(|r| !matches!(r, ExecutionResult::Failed(_))));
    assert_eq!(handle.row_count("categories"), 2);
    assert_eq!(handle.close_count(), 2);
}

#[tokio::test]
async fn test_statements_run_in_file_order() {
    let scripts = store_scripts();
    let client = MockDatabaseClient::new();
    let handle = client.handle();

    MigrationRunner::default()
        .run_scoped(Box::new(client), &scripts.sources)
        .await
        .unwrap();

    let executed = handle.executed();
    assert!(executed[0].starts_with("CREATE DATABASE"));
    assert_eq!(executed[1], "USE pc_store");
    assert!(executed[2].starts_with("CREATE TABLE categories"));
    assert!(executed[5].contains("'Processors'"));
    // Semicolons inside literals stay part of the statement
    assert!(executed[7].contains("'Gaming CPU; 8 cores'"));
    assert!(executed[9].starts_with("ALTER TABLE orders"));
}

#[tokio::test]
async fn test_inspect_after_migration() {
    let scripts = store_scripts();
    let client = MockDatabaseClient::new();
    let handle = client.handle();

    MigrationRunner::default()
        .run_scoped(Box::new(client), &scripts.sources)
        .await
        .unwrap();

    let mut client = handle.connect();
    let tables = inspect::inspect(&mut client).await.unwrap();
    let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["categories", "orders", "products"]);
    assert_eq!(tables[2].row_count, 2);
}

#[tokio::test]
async fn test_plan_matches_executed_statements() {
    let scripts = store_scripts();
    let plans = lint::plan(Default::default(), &scripts.sources)
        .await
        .unwrap();

    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0].statements.len(), 5);
    assert_eq!(plans[1].statements.len(), 4);
    assert!(plans[1]
        .statements
        .iter()
        .all(|s| s.info.kind == StatementKind::Insert));
    assert_eq!(plans[2].statements[0].info.kind, StatementKind::Alter);
    assert!(plans.iter().all(|p| p.warnings.is_empty()));
}
