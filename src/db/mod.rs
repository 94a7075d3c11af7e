//! Database abstraction layer for storefront-migrate.
//!
//! Provides a trait-based interface over the target database so the
//! migration runner does not depend on a particular backend.

mod mock;
mod mysql;
mod postgres;

pub use mock::{MockDatabaseClient, MockHandle};
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;

use crate::config::ConnectionConfig;
use crate::error::{Result, SqlError};
use async_trait::async_trait;

/// Supported database backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    MySql,
    Postgres,
}

impl DatabaseBackend {
    /// Returns the backend as a string for display and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend from a string or URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }
}

/// Opens a client for the configured backend.
///
/// Failures are reported as `MigrateError::Connection`.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    match config.backend() {
        DatabaseBackend::MySql => {
            let client = MySqlClient::connect(config).await?;
            Ok(Box::new(client))
        }
        DatabaseBackend::Postgres => {
            let client = PostgresClient::connect(config).await?;
            Ok(Box::new(client))
        }
    }
}

/// Interface the migration runner drives.
///
/// A client owns exactly one database session, so session-scoped commands
/// (`USE`, `SET`) carry over between calls. Methods take `&mut self`
/// because statements are issued strictly one at a time.
#[async_trait]
pub trait DatabaseClient: Send {
    /// The backend this client talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Executes SQL text using the simple (non-prepared) query protocol.
    ///
    /// DDL, session commands and multi-statement text are all accepted.
    /// No arguments are bound, so the server receives the text as a plain
    /// query (COM_QUERY on MySQL, a simple Query message on PostgreSQL).
    async fn execute_raw(&mut self, sql: &str) -> std::result::Result<(), SqlError>;

    /// Checks the metadata catalog for a column in the current database.
    async fn column_exists(
        &mut self,
        table: &str,
        column: &str,
    ) -> std::result::Result<bool, SqlError>;

    /// Lists base tables in the current database, sorted by name.
    async fn list_tables(&mut self) -> std::result::Result<Vec<String>, SqlError>;

    /// Counts the rows of a table.
    async fn count_rows(&mut self, table: &str) -> std::result::Result<i64, SqlError>;

    /// Closes the session. Consumes the client, so it can only happen once.
    async fn close(self: Box<Self>) -> Result<()>;
}
