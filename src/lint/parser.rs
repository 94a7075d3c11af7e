//! Statement classification with sqlparser.
//!
//! Uses the backend's dialect to parse a statement and map it to a
//! [`StatementKind`]. Statements sqlparser cannot handle (vendor table
//! options, versioned comments) fall back to their leading keyword.

use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use crate::db::DatabaseBackend;

use super::{StatementInfo, StatementKind};

/// Classifies one statement.
pub fn describe(backend: DatabaseBackend, sql: &str) -> StatementInfo {
    let dialect: Box<dyn Dialect> = match backend {
        DatabaseBackend::MySql => Box::new(MySqlDialect {}),
        DatabaseBackend::Postgres => Box::new(PostgreSqlDialect {}),
    };

    match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) if !statements.is_empty() => StatementInfo {
            kind: classify_statement(&statements[0]),
            parsed: true,
        },
        _ => StatementInfo {
            kind: keyword_kind(sql),
            parsed: false,
        },
    }
}

fn classify_statement(statement: &Statement) -> StatementKind {
    match statement {
        Statement::Query(_) => StatementKind::Select,
        Statement::Insert { .. } => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete { .. } => StatementKind::Delete,
        Statement::Drop { .. } => StatementKind::Drop,
        Statement::Truncate { .. } => StatementKind::Truncate,
        Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. } => StatementKind::Alter,
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. } => StatementKind::Create,
        Statement::SetVariable { .. } | Statement::SetNames { .. } => StatementKind::Set,
        Statement::Use { .. } => StatementKind::Use,
        _ => StatementKind::Other,
    }
}

/// Fallback classification by the first keyword.
fn keyword_kind(sql: &str) -> StatementKind {
    let first = sql
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or("")
        .to_uppercase();

    match first.as_str() {
        "CREATE" => StatementKind::Create,
        "ALTER" => StatementKind::Alter,
        "INSERT" | "REPLACE" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "DROP" => StatementKind::Drop,
        "TRUNCATE" => StatementKind::Truncate,
        "SELECT" | "WITH" => StatementKind::Select,
        "SET" => StatementKind::Set,
        "USE" => StatementKind::Use,
        _ => StatementKind::Other,
    }
}
