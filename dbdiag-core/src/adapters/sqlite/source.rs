//! Tabular handle over a SQLite query result.
//!
//! Column metadata comes from the prepared statement, so a query that returns
//! no rows still reports its columns. Cells are decoded lazily; SQLite is
//! dynamically typed, so each value is tried against the storage classes in
//! turn.

use crate::Result;
use crate::error::DiagError;
use crate::models::CellValue;
use crate::schema::TabularSource;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// A column as reported by the prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementColumn {
    /// Column name or alias
    pub name: String,
    /// Declared type, when the column maps to a table column
    pub type_name: Option<String>,
}

/// Result of one SQLite query.
pub struct SqliteSource {
    columns: Vec<StatementColumn>,
    rows: Vec<SqliteRow>,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl SqliteSource {
    /// Pairs the statement columns with the fetched rows.
    pub const fn new(columns: Vec<StatementColumn>, rows: Vec<SqliteRow>) -> Self {
        Self { columns, rows }
    }
}

impl TabularSource for SqliteSource {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.name.as_str())
    }

    fn column_type(&self, index: usize) -> Option<String> {
        self.columns.get(index).and_then(|c| c.type_name.clone())
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, column: usize) -> Result<CellValue> {
        let row = self
            .rows
            .get(row)
            .ok_or_else(|| DiagError::query_failed(format!("No row {} in result", row)))?;
        extract_cell(row, column)
    }
}

/// Decodes one value, trying text, integer, real, then blob.
fn extract_cell(row: &SqliteRow, index: usize) -> Result<CellValue> {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.map_or(CellValue::Null, CellValue::Text));
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.map_or(CellValue::Null, CellValue::Integer));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.map_or(CellValue::Null, CellValue::Float));
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(v.map_or(CellValue::Null, CellValue::Blob));
    }

    Err(DiagError::query_failed(format!(
        "Column {} holds a value of an unsupported type",
        index
    )))
}
