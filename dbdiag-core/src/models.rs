//! Core data models for collected diagnostic results.
//!
//! A [`ResultSet`] is the only thing a collector hands back to the engine. Its
//! column list is discovered at run time and frozen on creation; rows carry an
//! explicit ordinal so declared order survives any storage reordering.

use crate::error::{DiagError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Single cell value.
///
/// Cells carry no semantic type beyond how to stringify them, so renderers can
/// stay generic over any collector's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// SQL NULL
    Null,
    /// Text, rendered as-is
    Text(String),
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Boolean, rendered as `true`/`false`
    Boolean(bool),
    /// Timestamp, rendered as RFC 3339
    DateTime(chrono::DateTime<chrono::Utc>),
    /// Raw binary data, rendered as base64 text
    Blob(Vec<u8>),
}

impl CellValue {
    /// Returns the textual form of the cell, or `None` for SQL NULL.
    pub fn render_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Integer(n) => Some(Cow::Owned(n.to_string())),
            Self::Float(f) => Some(Cow::Owned(f.to_string())),
            Self::Boolean(b) => Some(Cow::Borrowed(if *b { "1" } else { "0" })),
            Self::DateTime(ts) => Some(Cow::Owned(
                ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            )),
            Self::Blob(bytes) => Some(Cow::Owned(format!(
                "base64:{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ))),
        }
    }

    /// Returns true for SQL NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Column metadata discovered from a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name, unique within a result
    pub name: String,
    /// Zero-based position in the visible column list
    pub ordinal: usize,
    /// Nullability as declared by the driver, when it knows
    pub declared_nullable: Option<bool>,
    /// Driver type name, informational only
    pub type_name: Option<String>,
}

impl ColumnDescriptor {
    /// Creates a column with unknown nullability and type.
    pub fn new(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            ordinal,
            declared_nullable: None,
            type_name: None,
        }
    }
}

/// One result row with its explicit ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Ordering key, unique within a result
    pub ordinal: u64,
    /// One cell per column
    pub cells: Vec<CellValue>,
}

/// A collector's tabular output.
///
/// Immutable after construction: there are no mutators, and rows are kept
/// sorted by their ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    name: String,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Creates a result set, validating shape and ordering keys.
    ///
    /// # Errors
    /// Returns an error if a column name is empty or duplicated, a row's width
    /// differs from the column count, or two rows share an ordinal.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>, mut rows: Vec<Row>) -> Result<Self> {
        let name = name.into();

        for (i, column) in columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(DiagError::missing_column(format!("#{}", i)));
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DiagError::duplicate_column(column.name.clone()));
            }
        }

        if let Some(row) = rows.iter().find(|r| r.cells.len() != columns.len()) {
            return Err(DiagError::query_failed(format!(
                "Result '{}' row {} has {} cells, expected {}",
                name,
                row.ordinal,
                row.cells.len(),
                columns.len()
            )));
        }

        rows.sort_by_key(|r| r.ordinal);
        if rows.windows(2).any(|w| w[0].ordinal == w[1].ordinal) {
            return Err(DiagError::query_failed(format!(
                "Result '{}' has duplicate row ordinals",
                name
            )));
        }

        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(ordinal, c)| ColumnDescriptor { ordinal, ..c })
            .collect();

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    /// Starts a builder that assigns row ordinals in insertion order.
    pub fn builder(name: impl Into<String>) -> ResultSetBuilder {
        ResultSetBuilder {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Result name (the producing collector's name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frozen column list.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Rows in ordinal order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns a copy under a different name, keeping columns and rows.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// Builder for [`ResultSet`], mostly used by in-process collectors and tests.
#[derive(Debug, Clone)]
pub struct ResultSetBuilder {
    name: String,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<CellValue>>,
}

impl ResultSetBuilder {
    /// Adds a column with unknown nullability.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        let ordinal = self.columns.len();
        self.columns.push(ColumnDescriptor::new(name, ordinal));
        self
    }

    /// Adds a column with declared nullability.
    pub fn column_nullable(mut self, name: impl Into<String>, nullable: bool) -> Self {
        let ordinal = self.columns.len();
        let mut column = ColumnDescriptor::new(name, ordinal);
        column.declared_nullable = Some(nullable);
        self.columns.push(column);
        self
    }

    /// Appends a row; its ordinal is its insertion position, starting at 1.
    pub fn row<I, V>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    /// Validates and builds the result set.
    ///
    /// # Errors
    /// See [`ResultSet::new`].
    pub fn build(self) -> Result<ResultSet> {
        let rows = self
            .rows
            .into_iter()
            .zip(1u64..)
            .map(|(cells, ordinal)| Row { ordinal, cells })
            .collect();
        ResultSet::new(self.name, self.columns, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_render_text() {
        assert_eq!(CellValue::Null.render_text(), None);
        assert_eq!(
            CellValue::from("abc").render_text().as_deref(),
            Some("abc")
        );
        assert_eq!(CellValue::Integer(-4).render_text().as_deref(), Some("-4"));
        assert_eq!(CellValue::Float(1.5).render_text().as_deref(), Some("1.5"));
        assert_eq!(CellValue::Boolean(true).render_text().as_deref(), Some("1"));
        assert_eq!(
            CellValue::Blob(vec![0xde, 0xad]).render_text().as_deref(),
            Some("base64:3q0=")
        );
    }

    #[test]
    fn test_datetime_renders_rfc3339() {
        let ts = chrono::DateTime::parse_from_rfc3339("2024-03-01T10:20:30Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(
            CellValue::DateTime(ts).render_text().as_deref(),
            Some("2024-03-01T10:20:30.000Z")
        );
    }

    #[test]
    fn test_option_into_cell() {
        let none: Option<&str> = None;
        assert!(CellValue::from(none).is_null());
        assert_eq!(CellValue::from(Some(3i64)), CellValue::Integer(3));
    }

    #[test]
    fn test_rows_sorted_by_ordinal() {
        let rows = vec![
            Row {
                ordinal: 3,
                cells: vec!["c".into()],
            },
            Row {
                ordinal: 1,
                cells: vec!["a".into()],
            },
            Row {
                ordinal: 2,
                cells: vec!["b".into()],
            },
        ];
        let rs = ResultSet::new("t", vec![ColumnDescriptor::new("v", 0)], rows).unwrap();
        let values: Vec<_> = rs
            .rows()
            .iter()
            .map(|r| r.cells[0].render_text().unwrap().into_owned())
            .collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_ordinals_rejected() {
        let rows = vec![
            Row {
                ordinal: 1,
                cells: vec![CellValue::Null],
            },
            Row {
                ordinal: 1,
                cells: vec![CellValue::Null],
            },
        ];
        assert!(ResultSet::new("t", vec![ColumnDescriptor::new("v", 0)], rows).is_err());
    }

    #[test]
    fn test_builder_rejects_ragged_rows() {
        let result = ResultSet::builder("t")
            .column("a")
            .column("b")
            .row(["only one"])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_duplicate_columns() {
        let result = ResultSet::builder("t").column("a").column("a").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_result_keeps_columns() {
        let rs = ResultSet::builder("t")
            .column("a")
            .column_nullable("b", true)
            .column("c")
            .build()
            .unwrap();
        assert!(rs.is_empty());
        assert_eq!(rs.columns().len(), 3);
        assert_eq!(rs.columns()[1].declared_nullable, Some(true));
        assert_eq!(rs.column_index("c"), Some(2));
    }
}
