//! Configuration resolution tests.
//!
//! Covers loading the TOML file and layering environment and command-line
//! values over it.

use std::collections::HashMap;
use storefront_migrate::config::{Config, ConnectionConfig};
use storefront_migrate::db::DatabaseBackend;
use storefront_migrate::migrate::ScriptKind;
use tempfile::TempDir;

const CONFIG: &str = r#"
[connections.default]
host = "db.internal"
database = "pc_store"
user = "migrator"

[connections.staging]
backend = "postgres"
host = "staging.internal"
port = 5433
ssl = true

[[scripts]]
kind = "schema"
path = "db/schema.sql"

[[scripts]]
kind = "add-column"
path = "db/add_image_url.sql"
table = "products"
column = "image_url"
"#;

fn env(vars: &[(&str, &str)]) -> ConnectionConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ConnectionConfig::from_env_with(|key| vars.get(key).cloned()).unwrap()
}

fn load(contents: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    let config = Config::load_from_file(&path).unwrap();
    (dir, config)
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_from_file(&dir.path().join("absent.toml")).unwrap();

    let resolved = config
        .resolve_connection(None, env(&[]), &ConnectionConfig::default())
        .unwrap();

    assert_eq!(resolved.backend(), DatabaseBackend::MySql);
    assert_eq!(resolved.host(), "localhost");
    assert_eq!(resolved.port(), 3306);
    assert_eq!(resolved.user(), "root");
    assert_eq!(resolved.password(), "");
    assert_eq!(resolved.database(), Some("pc_store"));
    assert!(!resolved.ssl());
    assert!(config.script_sources().unwrap().is_empty());
}

#[test]
fn test_file_overrides_environment() {
    let (_dir, config) = load(CONFIG);

    let resolved = config
        .resolve_connection(
            None,
            env(&[("DB_HOST", "env-host"), ("DB_PASSWORD", "secret")]),
            &ConnectionConfig::default(),
        )
        .unwrap();

    assert_eq!(resolved.host(), "db.internal");
    assert_eq!(resolved.user(), "migrator");
    // Values the file leaves unset still come from the environment
    assert_eq!(resolved.password(), "secret");
}

#[test]
fn test_cli_overrides_everything() {
    let (_dir, config) = load(CONFIG);
    let cli = ConnectionConfig {
        host: Some("cli-host".to_string()),
        database: Some(String::new()),
        ..Default::default()
    };

    let resolved = config
        .resolve_connection(None, env(&[("DB_HOST", "env-host")]), &cli)
        .unwrap();

    assert_eq!(resolved.host(), "cli-host");
    // An empty name connects without selecting a database
    assert_eq!(resolved.database(), None);
}

#[test]
fn test_named_connection() {
    let (_dir, config) = load(CONFIG);

    let resolved = config
        .resolve_connection(Some("staging"), env(&[]), &ConnectionConfig::default())
        .unwrap();

    assert_eq!(resolved.backend(), DatabaseBackend::Postgres);
    assert_eq!(resolved.port(), 5433);
    assert_eq!(resolved.user(), "postgres");
    assert!(resolved.ssl());
}

#[test]
fn test_unknown_named_connection() {
    let (_dir, config) = load(CONFIG);

    let err = config
        .resolve_connection(Some("prod"), env(&[]), &ConnectionConfig::default())
        .unwrap_err();

    assert!(err.to_string().contains("Connection 'prod' not found"));
}

#[test]
fn test_database_url_from_environment() {
    let resolved = Config::default()
        .resolve_connection(
            None,
            env(&[(
                "DATABASE_URL",
                "mysql://shop:pw@mysql.internal:3307/pc_store?multipleStatements=true",
            )]),
            &ConnectionConfig::default(),
        )
        .unwrap();

    assert_eq!(resolved.host(), "mysql.internal");
    assert_eq!(resolved.port(), 3307);
    assert_eq!(resolved.user(), "shop");
    assert!(resolved.multiple_statements());
}

#[test]
fn test_scripts_from_file() {
    let (_dir, config) = load(CONFIG);

    let sources = config.script_sources().unwrap();

    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].kind, ScriptKind::Schema);
    match &sources[1].kind {
        ScriptKind::AddColumn(target) => assert_eq!(target.to_string(), "products.image_url"),
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connections.default\nhost = 1").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert_eq!(err.category(), "Configuration Error");
}
