//! Error types for storefront-migrate.
//!
//! Defines the main error enum used throughout the crate, plus the
//! backend-tagged SQL error that the runner classifies.

use crate::db::DatabaseBackend;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A database error as reported by the server.
///
/// `code` is the vendor classification: the numeric error number for MySQL
/// (e.g. `1050`), the SQLSTATE for PostgreSQL (e.g. `42P07`). It is `None`
/// when the failure did not come from the server (I/O, protocol errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlError {
    pub backend: DatabaseBackend,
    pub code: Option<String>,
    pub message: String,
}

impl SqlError {
    pub fn new(backend: DatabaseBackend, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            backend,
            code,
            message: message.into(),
        }
    }

    /// Creates an error carrying a server code.
    pub fn with_code(
        backend: DatabaseBackend,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(backend, Some(code.into()), message)
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{} {}] {}", self.backend.as_str(), code, self.message),
            None => write!(f, "[{}] {}", self.backend.as_str(), self.message),
        }
    }
}

impl std::error::Error for SqlError {}

/// Main error type for storefront-migrate operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The database session could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A script file could not be read.
    #[error("Cannot read script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A database error outside the ignorable set.
    #[error("SQL error: {0}")]
    Sql(SqlError),

    /// Configuration errors (invalid config file, bad script argument, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MigrateError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an I/O error for the given script path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Io { .. } => "I/O Error",
            Self::Sql(_) => "SQL Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<SqlError> for MigrateError {
    fn from(err: SqlError) -> Self {
        Self::Sql(err)
    }
}

/// Result type alias using MigrateError.
pub type Result<T> = std::result::Result<T, MigrateError>;
