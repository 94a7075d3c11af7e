//! Database inspection.
//!
//! Lists the tables of the current database with their row counts, for
//! checking what a migration run left behind.

use crate::db::DatabaseClient;
use crate::error::Result;
use tracing::debug;

/// A table and its row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub row_count: i64,
}

/// Collects a summary of every base table.
pub async fn inspect(client: &mut dyn DatabaseClient) -> Result<Vec<TableSummary>> {
    let tables = client.list_tables().await?;
    debug!("Found {} tables", tables.len());

    let mut summaries = Vec::with_capacity(tables.len());
    for name in tables {
        let row_count = client.count_rows(&name).await?;
        summaries.push(TableSummary { name, row_count });
    }

    Ok(summaries)
}

/// Renders summaries as an aligned two-column table.
pub fn render(summaries: &[TableSummary]) -> String {
    if summaries.is_empty() {
        return "No tables found.".to_string();
    }

    let width = summaries
        .iter()
        .map(|s| s.name.len())
        .chain(std::iter::once("table".len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{:<width$}  rows\n", "table");
    out.push_str(&format!("{}  ----\n", "-".repeat(width)));
    for summary in summaries {
        out.push_str(&format!("{:<width$}  {}\n", summary.name, summary.row_count));
    }
    out
}
