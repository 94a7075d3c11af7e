//! MySQL database client implementation.
//!
//! Provides the `MySqlClient` struct that implements the `DatabaseClient` trait
//! for MySQL and MariaDB servers using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{DatabaseBackend, DatabaseClient};
use crate::error::{MigrateError, Result, SqlError};
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use sqlx::pool::PoolConnection;
use std::time::Duration;
use tracing::debug;

/// MySQL database client holding one session for the whole run.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
    conn: PoolConnection<MySql>,
}

impl MySqlClient {
    /// Connects and checks out the session used for all statements.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(config.host())
            .port(config.port())
            .username(config.user())
            .password(config.password())
            .ssl_mode(if config.ssl() {
                MySqlSslMode::VerifyIdentity
            } else {
                MySqlSslMode::Preferred
            });
        if let Some(database) = config.database() {
            options = options.database(database);
        }

        debug!("Connecting to {}", config.display_string());

        let pool = MySqlPoolOptions::new()
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
impl DatabaseClient for MySqlClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
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
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?
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
            SELECT CAST(TABLE_NAME AS CHAR)
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await
        .map_err(to_sql_error)
    }

    async fn count_rows(&mut self, table: &str) -> std::result::Result<i64, SqlError> {
        let sql = format!("SELECT COUNT(*) FROM `{}`", table.replace('`', "``"));
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

/// Converts a sqlx error, keeping the MySQL error number as the code.
fn to_sql_error(error: sqlx::Error) -> SqlError {
    match error.as_database_error() {
        Some(db_error) => {
            let code = db_error
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number().to_string())
                .or_else(|| db_error.code().map(|c| c.into_owned()));
            SqlError::new(DatabaseBackend::MySql, code, db_error.message())
        }
        None => SqlError::new(DatabaseBackend::MySql, None, error.to_string()),
    }
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> MigrateError {
    let host = config.host();
    let port = config.port();
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        MigrateError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        MigrateError::connection(format!(
            "Access denied for user '{}'. Check your credentials.",
            config.user()
        ))
    } else if error_str.contains("unknown database") {
        MigrateError::connection(format!(
            "Database '{}' does not exist. Set an empty database name to connect without one.",
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
