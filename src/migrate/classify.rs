//! Failure classification for script statements.
//!
//! Decides, per backend and script category, which server errors mean
//! "this change is already in place" and can be skipped.

use super::script::ScriptCategory;
use crate::db::DatabaseBackend;
use crate::error::SqlError;
use std::collections::HashMap;

/// What the runner should do with a failed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Record a skip with this reason and continue.
    Ignorable(String),
    /// Abort the run.
    Fatal,
}

/// Maps a statement failure to a [`Disposition`].
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, category: ScriptCategory, error: &SqlError) -> Disposition;
}

/// Classifier backed by a table of (backend, category, code) entries.
#[derive(Debug, Clone, Default)]
pub struct CodeTable {
    entries: HashMap<(DatabaseBackend, ScriptCategory), HashMap<String, String>>,
}

impl CodeTable {
    /// A table with no ignorable codes: every failure is fatal.
    pub fn new() -> Self {
        Self::default()
    }

    /// The ignorable sets for MySQL and PostgreSQL schema and seed scripts.
    ///
    /// Add-column scripts have no entries; they rely on the catalog pre-check.
    pub fn builtin() -> Self {
        use DatabaseBackend::{MySql, Postgres};
        use ScriptCategory::{Schema, Seed};

        Self::new()
            // ER_TABLE_EXISTS_ERROR
            .allow(MySql, Schema, "1050", "table already exists")
            // ER_DB_CREATE_EXISTS
            .allow(MySql, Schema, "1007", "database already exists")
            // ER_DUP_ENTRY
            .allow(MySql, Seed, "1062", "duplicate entry")
            .allow(Postgres, Schema, "42P07", "table already exists")
            .allow(Postgres, Schema, "42P04", "database already exists")
            .allow(Postgres, Seed, "23505", "duplicate entry")
    }

    /// Adds an ignorable code.
    pub fn allow(
        mut self,
        backend: DatabaseBackend,
        category: ScriptCategory,
        code: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.entries
            .entry((backend, category))
            .or_default()
            .insert(code.into(), reason.into());
        self
    }

    /// Returns true if the code is ignorable for this backend and category.
    pub fn is_ignorable(&self, backend: DatabaseBackend, category: ScriptCategory, code: &str) -> bool {
        self.entries
            .get(&(backend, category))
            .is_some_and(|codes| codes.contains_key(code))
    }
}

impl ErrorClassifier for CodeTable {
    fn classify(&self, category: ScriptCategory, error: &SqlError) -> Disposition {
        let Some(code) = error.code.as_deref() else {
            return Disposition::Fatal;
        };

        match self
            .entries
            .get(&(error.backend, category))
            .and_then(|codes| codes.get(code))
        {
            Some(reason) => Disposition::Ignorable(reason.clone()),
            None => Disposition::Fatal,
        }
    }
}
