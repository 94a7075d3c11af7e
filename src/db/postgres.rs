//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{DatabaseBackend, DatabaseClient};
use crate::error::{MigrateError, Result, SqlError};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode, Postgres};
use std::time::Duration;
use tracing::debug;

/// PostgreSQL database client holding one session for the whole run.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    conn: PoolConnection<Postgres>,
}

impl PostgresClient {
    /// Connects and checks out the session used for all statements.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut options = PgConnectOptions::new()
            .host(config.host())
            .port(config.port())
            .username(config.user())
            .password(config.password())
            .ssl_mode(if config.ssl() {
                PgSslMode::VerifyFull
            } else {
                PgSslMode::Prefer
            });
        if let Some(database) = config.database() {
            options = options.database(database);
        }

        debug!("Connecting to {}", config.display_string());

        let pool = PgPoolOptions::new()
            .max_connections(config.connection_limit())
            .acquire_timeout(Duration::from_secs(config.connect_timeout()))
            .connect_with(options)
            .await
            .map_err(|e| map_connection_error(e, config))?;

        let conn = pool
            .acquire()
            .await
            .map_err(|e| map_connection_error(e, config))?;

        debug!("Successfully connected to database");
        Ok(Self { pool, conn })
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    async fn execute_raw(&mut self, sql: &str) -> std::result::Result<(), SqlError> {
        sqlx::Executor::execute(&mut *self.conn, sql)
            .await
            .map(|_| ())
            .map_err(to_sql_error)
    }

    async fn column_exists(
        &mut self,
        table: &str,
        column: &str,
    ) -> std::result::Result<bool, SqlError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2
            "#,
        )
        .bind(table)
        .bind(column)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(to_sql_error)?;

        Ok(count > 0)
    }

    async fn list_tables(&mut self) -> std::result::Result<Vec<String>, SqlError> {
        sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await
        .map_err(to_sql_error)
    }

    async fn count_rows(&mut self, table: &str) -> std::result::Result<i64, SqlError> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\""));
        sqlx::query_scalar(&sql)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(to_sql_error)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let Self { pool, conn } = *self;
        drop(conn);
        pool.close().await;
        debug!("Connection closed");
        Ok(())
    }
}

/// Converts a sqlx error, keeping the SQLSTATE as the code.
fn to_sql_error(error: sqlx::Error) -> SqlError {
    match error.as_database_error() {
        Some(db_error) => SqlError::new(
            DatabaseBackend::Postgres,
            db_error.code().map(|c| c.into_owned()),
            db_error.message(),
        ),
        None => SqlError::new(DatabaseBackend::Postgres, None, error.to_string()),
    }
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> MigrateError {
    let host = config.host();
    let port = config.port();
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        MigrateError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        MigrateError::connection(format!(
            "Authentication failed for user '{}'. Check your credentials.",
            config.user()
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        MigrateError::connection(format!(
            "Database '{}' does not exist.",
            config.database().unwrap_or_default()
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        MigrateError::connection(format!(
            "Connection to {host}:{port} timed out after {}s.",
            config.connect_timeout()
        ))
    } else {
        MigrateError::connection(error.to_string())
    }
}
