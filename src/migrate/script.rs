//! Script sources, loading and statement splitting.

use crate::db::DatabaseBackend;
use crate::error::{MigrateError, Result};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Longest statement preview written to the log.
const PREVIEW_CHARS: usize = 72;

fn identifier_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,63}$").expect("identifier pattern is valid")
    })
}

/// Column an add-column script introduces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTarget {
    pub table: String,
    pub column: String,
}

impl ColumnTarget {
    /// Creates a target after checking both names are plain identifiers.
    pub fn new(table: &str, column: &str) -> Result<Self> {
        for name in [table, column] {
            if !identifier_regex().is_match(name) {
                return Err(MigrateError::config(format!(
                    "'{name}' is not a valid table or column name"
                )));
            }
        }

        Ok(Self {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

impl fmt::Display for ColumnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// What a script does, which decides how its failures are treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    /// Creates databases, tables and indexes.
    Schema,
    /// Inserts baseline data.
    Seed,
    /// Adds one column; skipped entirely when the column already exists.
    AddColumn(ColumnTarget),
}

impl ScriptKind {
    pub fn category(&self) -> ScriptCategory {
        match self {
            Self::Schema => ScriptCategory::Schema,
            Self::Seed => ScriptCategory::Seed,
            Self::AddColumn(_) => ScriptCategory::AddColumn,
        }
    }
}

/// Data-free discriminant of [`ScriptKind`], used as a classifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptCategory {
    Schema,
    Seed,
    AddColumn,
}

impl ScriptCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Seed => "seed",
            Self::AddColumn => "add-column",
        }
    }
}

impl fmt::Display for ScriptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script file and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub path: PathBuf,
    pub kind: ScriptKind,
}

impl ScriptSource {
    pub fn new(path: impl Into<PathBuf>, kind: ScriptKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn schema(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ScriptKind::Schema)
    }

    pub fn seed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ScriptKind::Seed)
    }

    pub fn add_column(path: impl Into<PathBuf>, target: ColumnTarget) -> Self {
        Self::new(path, ScriptKind::AddColumn(target))
    }
}

/// Parses `schema:PATH`, `seed:PATH` or `add-column:TABLE.COLUMN:PATH`.
impl FromStr for ScriptSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let Some((kind, rest)) = s.split_once(':') else {
            return Err(format!(
                "Invalid script '{s}'. Expected schema:PATH, seed:PATH or add-column:TABLE.COLUMN:PATH"
            ));
        };

        if rest.is_empty() {
            return Err(format!("Script '{s}' has no path"));
        }

        match kind.to_lowercase().as_str() {
            "schema" => Ok(Self::schema(rest)),
            "seed" => Ok(Self::seed(rest)),
            "add-column" | "add_column" => {
                let (target, path) = rest
                    .split_once(':')
                    .filter(|(_, path)| !path.is_empty())
                    .ok_or_else(|| format!("Script '{s}' must be add-column:TABLE.COLUMN:PATH"))?;
                let (table, column) = target
                    .split_once('.')
                    .ok_or_else(|| format!("Column target '{target}' must be TABLE.COLUMN"))?;
                let target = ColumnTarget::new(table, column).map_err(|e| e.to_string())?;
                Ok(Self::add_column(path, target))
            }
            other => Err(format!(
                "Unknown script kind '{other}'. Expected schema, seed or add-column"
            )),
        }
    }
}

/// The statements of one script file, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub statements: Vec<String>,
}

impl Script {
    /// Reads and splits a script file using `backend`'s lexical rules.
    pub async fn load(backend: DatabaseBackend, path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MigrateError::io(path, e))?;
        Ok(Self::parse(backend, &text))
    }

    pub fn parse(backend: DatabaseBackend, text: &str) -> Self {
        Self {
            statements: split_statements(backend, text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState<'a> {
    Code,
    /// `escapes` is set when a backslash escapes the next character.
    Quoted { quote: char, escapes: bool },
    /// PostgreSQL `$tag$ ... $tag$` body. The tag includes both dollars.
    DollarQuoted(&'a str),
    LineComment,
    /// `keep` is set for MySQL `/*! ... */` comments, which the server executes.
    BlockComment { keep: bool, depth: usize },
}

/// Splits script text into trimmed statements on `;`, lexing it the way
/// `backend` does.
///
/// Terminators inside quoted strings, identifiers and comments do not split.
/// Plain comments are dropped from the output; empty and comment-only
/// fragments are discarded. `DELIMITER` blocks are not supported.
///
/// MySQL: backslash escapes in `'` and `"` strings, backtick identifiers,
/// `#` comments, and `--` comments only when followed by whitespace.
///
/// PostgreSQL: `$tag$` quoting, backslash escapes only in `E'...'` strings,
/// `--` always starts a comment, and block comments nest.
pub fn split_statements(backend: DatabaseBackend, text: &str) -> Vec<String> {
    let mysql = backend == DatabaseBackend::MySql;
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = SplitState::Code;
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        let rest = &text[pos..];
        let mut step = c.len_utf8();

        match state {
            SplitState::Code => match c {
                ';' => flush_statement(&mut statements, &mut current),
                '\'' => {
                    let escapes = mysql || is_escape_string_prefix(&current);
                    current.push(c);
                    state = SplitState::Quoted { quote: c, escapes };
                }
                '"' => {
                    current.push(c);
                    state = SplitState::Quoted {
                        quote: c,
                        escapes: mysql,
                    };
                }
                '`' if mysql => {
                    current.push(c);
                    state = SplitState::Quoted {
                        quote: c,
                        escapes: false,
                    };
                }
                '#' if mysql => state = SplitState::LineComment,
                '-' if rest.starts_with("--")
                    && (!mysql || rest[2..].chars().next().map_or(true, char::is_whitespace)) =>
                {
                    step = 2;
                    state = SplitState::LineComment;
                }
                '/' if rest.starts_with("/*") => {
                    step = 2;
                    if mysql && rest.starts_with("/*!") {
                        current.push_str("/*");
                        state = SplitState::BlockComment { keep: true, depth: 1 };
                    } else {
                        current.push(' ');
                        state = SplitState::BlockComment { keep: false, depth: 1 };
                    }
                }
                '$' if !mysql && !ends_with_identifier_char(&current) => match dollar_tag(rest) {
                    Some(tag) => {
                        current.push_str(tag);
                        step = tag.len();
                        state = SplitState::DollarQuoted(tag);
                    }
                    None => current.push(c),
                },
                _ => current.push(c),
            },
            SplitState::Quoted { quote, escapes } => {
                current.push(c);
                if c == '\\' && escapes {
                    if let Some(escaped) = rest[1..].chars().next() {
                        current.push(escaped);
                        step += escaped.len_utf8();
                    }
                } else if c == quote {
                    state = SplitState::Code;
                }
            }
            SplitState::DollarQuoted(tag) => {
                if rest.starts_with(tag) {
                    current.push_str(tag);
                    step = tag.len();
                    state = SplitState::Code;
                } else {
                    current.push(c);
                }
            }
            SplitState::LineComment => {
                if c == '\n' {
                    current.push('\n');
                    state = SplitState::Code;
                }
            }
            SplitState::BlockComment { keep, depth } => {
                if rest.starts_with("*/") {
                    step = 2;
                    if keep {
                        current.push_str("*/");
                    }
                    state = if depth > 1 {
                        SplitState::BlockComment {
                            keep,
                            depth: depth - 1,
                        }
                    } else {
                        SplitState::Code
                    };
                } else if !mysql && rest.starts_with("/*") {
                    step = 2;
                    state = SplitState::BlockComment {
                        keep,
                        depth: depth + 1,
                    };
                } else if keep {
                    current.push(c);
                }
            }
        }

        pos += step;
    }

    // Last statement may lack a terminator
    flush_statement(&mut statements, &mut current);
    statements
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn ends_with_identifier_char(text: &str) -> bool {
    text.chars().next_back().is_some_and(is_identifier_char)
}

/// True when the text before a `'` is a lone `E` prefix (`E'...'`).
fn is_escape_string_prefix(before: &str) -> bool {
    let mut tail = before.chars().rev();
    matches!(tail.next(), Some('E' | 'e')) && !tail.next().is_some_and(is_identifier_char)
}

/// The `$tag$` opening `rest`, if any. Tags follow identifier rules, so
/// positional parameters such as `$1` are not tags.
fn dollar_tag(rest: &str) -> Option<&str> {
    let body = rest.strip_prefix('$')?;
    let end = body.find('$')?;
    let tag = &body[..end];
    let valid = tag.chars().next().map_or(true, |c| !c.is_ascii_digit())
        && tag.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then(|| &rest[..end + 2])
}

fn flush_statement(statements: &mut Vec<String>, current: &mut String) {
    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
    current.clear();
}

/// One-line, length-limited rendering of a statement for log output.
pub fn preview(statement: &str) -> String {
    let collapsed = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= PREVIEW_CHARS {
        return collapsed;
    }
    let mut short: String = collapsed.chars().take(PREVIEW_CHARS - 3).collect();
    short.push_str("...");
    short
}
