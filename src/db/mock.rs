//! Mock database client for testing.
//!
//! Keeps a tiny in-memory catalog and understands just enough SQL to behave
//! like a real server on re-runs: creating an existing table, inserting the
//! same row twice, or adding an existing column fail with the backend's
//! real error codes. Unknown statements fail as syntax errors.

use super::{DatabaseBackend, DatabaseClient};
use crate::error::{Result, SqlError};
use crate::migrate::split_statements;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MockState {
    databases: HashSet<String>,
    /// Table name to column names.
    tables: BTreeMap<String, Vec<String>>,
    /// Table name to the normalized text of each inserted row.
    rows: BTreeMap<String, HashSet<String>>,
    executed: Vec<String>,
    closed: usize,
}

#[derive(Debug, Clone, Copy)]
enum MockFailure {
    TableExists,
    DatabaseExists,
    DuplicateEntry,
    DuplicateColumn,
    NoSuchTable,
    Syntax,
}

/// Shared view of a mock client's state that survives `close`.
#[derive(Debug, Clone)]
pub struct MockHandle {
    backend: DatabaseBackend,
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens another client on the same in-memory database.
    pub fn connect(&self) -> MockDatabaseClient {
        MockDatabaseClient {
            backend: self.backend,
            state: Arc::clone(&self.state),
        }
    }

    /// Every statement the client was asked to run, in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// How many times `close` was called.
    pub fn close_count(&self) -> usize {
        self.lock().closed
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(&table.to_lowercase())
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.lock()
            .tables
            .get(&table.to_lowercase())
            .is_some_and(|cols| cols.iter().any(|c| c == &column.to_lowercase()))
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock()
            .rows
            .get(&table.to_lowercase())
            .map_or(0, HashSet::len)
    }
}

/// An in-memory database client for tests.
#[derive(Debug)]
pub struct MockDatabaseClient {
    backend: DatabaseBackend,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDatabaseClient {
    /// Creates an empty MySQL-flavoured mock.
    pub fn new() -> Self {
        Self::with_backend(DatabaseBackend::MySql)
    }

    /// Creates an empty mock reporting the given backend's error codes.
    pub fn with_backend(backend: DatabaseBackend) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Pre-creates a table with the given columns.
    pub fn with_table(self, table: &str, columns: &[&str]) -> Self {
        self.handle().lock().tables.insert(
            table.to_lowercase(),
            columns.iter().map(|c| c.to_lowercase()).collect(),
        );
        self
    }

    /// Returns a handle for inspecting state after the client is consumed.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            backend: self.backend,
            state: Arc::clone(&self.state),
        }
    }

    fn error(&self, failure: MockFailure, detail: &str) -> SqlError {
        let (mysql, postgres, message) = match failure {
            MockFailure::TableExists => ("1050", "42P07", format!("Table '{detail}' already exists")),
            MockFailure::DatabaseExists => (
                "1007",
                "42P04",
                format!("Can't create database '{detail}'; database exists"),
            ),
            MockFailure::DuplicateEntry => {
                ("1062", "23505", format!("Duplicate entry in '{detail}'"))
            }
            MockFailure::DuplicateColumn => {
                ("1060", "42701", format!("Duplicate column name '{detail}'"))
            }
            MockFailure::NoSuchTable => ("1146", "42P01", format!("Table '{detail}' doesn't exist")),
            MockFailure::Syntax => (
                "1064",
                "42601",
                format!("You have an error in your SQL syntax near '{detail}'"),
            ),
        };
        let code = match self.backend {
            DatabaseBackend::MySql => mysql,
            DatabaseBackend::Postgres => postgres,
        };
        SqlError::with_code(self.backend, code, message)
    }

    fn execute_one(&self, state: &mut MockState, sql: &str) -> std::result::Result<(), SqlError> {
        state.executed.push(sql.to_string());

        let words: Vec<String> = sql.split_whitespace().map(str::to_uppercase).collect();
        let raw: Vec<&str> = sql.split_whitespace().collect();
        let word = |i: usize| words.get(i).map(String::as_str).unwrap_or("");

        match word(0) {
            "CREATE" if matches!(word(1), "DATABASE" | "SCHEMA") => {
                let (if_not_exists, at) = if_clause(&words, 2, "NOT");
                let name = ident(raw.get(at).copied().unwrap_or(""));
                if !state.databases.insert(name.clone()) && !if_not_exists {
                    return Err(self.error(MockFailure::DatabaseExists, &name));
                }
                Ok(())
            }
            "CREATE" if word(1) == "TABLE" => {
                let (if_not_exists, at) = if_clause(&words, 2, "NOT");
                let name = ident(raw.get(at).copied().unwrap_or(""));
                if state.tables.contains_key(&name) {
                    return if if_not_exists {
                        Ok(())
                    } else {
                        Err(self.error(MockFailure::TableExists, &name))
                    };
                }
                state.tables.insert(name, column_names(sql));
                Ok(())
            }
            "CREATE" if matches!(word(1), "INDEX" | "UNIQUE" | "VIEW" | "FUNCTION" | "TRIGGER" | "OR") => {
                Ok(())
            }
            "ALTER" if word(1) == "TABLE" && word(3) == "ADD" => {
                let name = ident(raw.get(2).copied().unwrap_or(""));
                let col_at = if word(4) == "COLUMN" { 5 } else { 4 };
                let column = ident(raw.get(col_at).copied().unwrap_or(""));
                let Some(columns) = state.tables.get_mut(&name) else {
                    return Err(self.error(MockFailure::NoSuchTable, &name));
                };
                if columns.contains(&column) {
                    return Err(self.error(MockFailure::DuplicateColumn, &column));
                }
                columns.push(column);
                Ok(())
            }
            "INSERT" | "REPLACE" => {
                let ignore = word(1) == "IGNORE";
                let into_at = words.iter().position(|w| w == "INTO").unwrap_or(1);
                let name = ident(raw.get(into_at + 1).copied().unwrap_or(""));
                if !state.tables.contains_key(&name) {
                    return Err(self.error(MockFailure::NoSuchTable, &name));
                }
                let row = words.join(" ");
                let inserted = state.rows.entry(name.clone()).or_default().insert(row);
                if !inserted && !ignore && word(0) == "INSERT" {
                    return Err(self.error(MockFailure::DuplicateEntry, &name));
                }
                Ok(())
            }
            "DROP" if word(1) == "TABLE" => {
                let (if_exists, at) = if_clause(&words, 2, "EXISTS");
                let name = ident(raw.get(at).copied().unwrap_or(""));
                if state.tables.remove(&name).is_none() && !if_exists {
                    return Err(self.error(MockFailure::NoSuchTable, &name));
                }
                state.rows.remove(&name);
                Ok(())
            }
            "USE" | "SET" | "SELECT" | "UPDATE" | "DELETE" | "DO" => Ok(()),
            _ => Err(self.error(MockFailure::Syntax, raw.first().copied().unwrap_or(""))),
        }
    }
}

/// Detects `IF NOT EXISTS` / `IF EXISTS` at `at`; returns the flag and the name index.
fn if_clause(words: &[String], at: usize, second: &str) -> (bool, usize) {
    if words.get(at).is_some_and(|w| w == "IF") && words.get(at + 1).is_some_and(|w| w == second) {
        let skip = if second == "NOT" { 3 } else { 2 };
        (true, at + skip)
    } else {
        (false, at)
    }
}

/// Strips quoting and any trailing column list from an identifier token.
fn ident(token: &str) -> String {
    token
        .split('(')
        .next()
        .unwrap_or("")
        .trim_matches(|c| c == '`' || c == '"' || c == ';')
        .to_lowercase()
}

/// Column names from a `CREATE TABLE name (...)` body.
fn column_names(sql: &str) -> Vec<String> {
    let (Some(open), Some(close)) = (sql.find('('), sql.rfind(')')) else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }

    let mut columns = Vec::new();
    let mut depth = 0;
    let mut start = open + 1;
    let body = &sql[..close];
    for (i, c) in body.char_indices().skip_while(|(i, _)| *i <= open) {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                columns.extend(column_name(&body[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    columns.extend(column_name(&body[start..]));
    columns
}

fn column_name(definition: &str) -> Option<String> {
    let first = definition.split_whitespace().next()?;
    match first.to_uppercase().as_str() {
        "PRIMARY" | "UNIQUE" | "KEY" | "INDEX" | "FOREIGN" | "CONSTRAINT" | "CHECK" => None,
        _ => Some(ident(first)),
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    async fn execute_raw(&mut self, sql: &str) -> std::result::Result<(), SqlError> {
        let handle = self.handle();
        let mut state = handle.lock();
        // Multi-statement text stops at the first failure, like the server
        for statement in split_statements(self.backend, sql) {
            self.execute_one(&mut state, &statement)?;
        }
        Ok(())
    }

    async fn column_exists(
        &mut self,
        table: &str,
        column: &str,
    ) -> std::result::Result<bool, SqlError> {
        Ok(self.handle().has_column(table, column))
    }

    async fn list_tables(&mut self) -> std::result::Result<Vec<String>, SqlError> {
        Ok(self.handle().lock().tables.keys().cloned().collect())
    }

    async fn count_rows(&mut self, table: &str) -> std::result::Result<i64, SqlError> {
        let handle = self.handle();
        if !handle.has_table(table) {
            return Err(self.error(MockFailure::NoSuchTable, table));
        }
        Ok(handle.row_count(table) as i64)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.handle().lock().closed += 1;
        Ok(())
    }
}
