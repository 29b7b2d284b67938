//! Runtime schema discovery over opaque tabular results.
//!
//! Collectors hand back whatever their driver produced, wrapped in a
//! [`TabularSource`]. The [`SchemaIntrospector`] asks that handle for its
//! column metadata (never a static registry) and freezes the columns and rows
//! into a [`ResultSet`] exactly once. Renderers only ever see the frozen copy.

use crate::error::{DiagError, Result};
use crate::models::{CellValue, ColumnDescriptor, ResultSet, Row};

/// Name of the synthetic ordering column a source may expose.
pub const DEFAULT_ORDERING_COLUMN: &str = "__row_number";

/// Opaque handle to a driver result.
///
/// Column metadata must be available even when the result has zero rows.
pub trait TabularSource {
    /// Number of columns, including any synthetic ordering column.
    fn column_count(&self) -> usize;

    /// Column name at `index`, if the driver reported one.
    fn column_name(&self, index: usize) -> Option<&str>;

    /// Declared nullability at `index`, when the driver knows it.
    fn column_nullable(&self, _index: usize) -> Option<bool> {
        None
    }

    /// Driver type name at `index`, when available.
    fn column_type(&self, _index: usize) -> Option<String> {
        None
    }

    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Value at (`row`, `column`).
    ///
    /// # Errors
    /// Returns an error if the driver cannot decode the value.
    fn cell(&self, row: usize, column: usize) -> Result<CellValue>;
}

/// In-memory tabular source, used by in-process collectors and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl MemorySource {
    /// Creates a source with the given column names and no rows.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row in source order.
    pub fn with_row<I, V>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }
}

impl TabularSource for MemorySource {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, column: usize) -> Result<CellValue> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .ok_or_else(|| {
                DiagError::query_failed(format!("No cell at row {} column {}", row, column))
            })
    }
}

/// Discovers columns of a tabular source and snapshots it into a `ResultSet`.
#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    ordering_column: String,
}

impl Default for SchemaIntrospector {
    fn default() -> Self {
        Self::new(DEFAULT_ORDERING_COLUMN)
    }
}

impl SchemaIntrospector {
    /// Creates an introspector recognizing `ordering_column` as the row key.
    pub fn new(ordering_column: impl Into<String>) -> Self {
        Self {
            ordering_column: ordering_column.into(),
        }
    }

    /// Ordered visible column list of a source.
    ///
    /// The synthetic ordering column, when present, is excluded.
    ///
    /// # Errors
    /// Returns `MalformedResult` if a column has no name or a name repeats.
    pub fn columns(&self, source: &dyn TabularSource) -> Result<Vec<ColumnDescriptor>> {
        let mut columns: Vec<ColumnDescriptor> = Vec::with_capacity(source.column_count());

        for index in 0..source.column_count() {
            let name = source
                .column_name(index)
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| DiagError::missing_column(format!("#{}", index)))?;

            if name == self.ordering_column {
                continue;
            }
            if columns.iter().any(|c| c.name == name) {
                return Err(DiagError::duplicate_column(name));
            }

            columns.push(ColumnDescriptor {
                name: name.to_string(),
                ordinal: columns.len(),
                declared_nullable: source.column_nullable(index),
                type_name: source.column_type(index),
            });
        }

        Ok(columns)
    }

    /// Freezes a source into a `ResultSet` named `name`.
    ///
    /// Columns are introspected once here. Row ordinals come from the ordering
    /// column when the source has one, otherwise from source order (from 1).
    ///
    /// # Errors
    /// Returns an error if columns cannot be resolved, a cell cannot be
    /// decoded, or an ordering value is not a non-negative integer.
    pub fn snapshot(&self, name: &str, source: &dyn TabularSource) -> Result<ResultSet> {
        let columns = self.columns(source)?;

        let ordering_index = (0..source.column_count())
            .find(|&i| source.column_name(i) == Some(self.ordering_column.as_str()));
        let visible: Vec<usize> = (0..source.column_count())
            .filter(|&i| Some(i) != ordering_index)
            .collect();

        let mut rows = Vec::with_capacity(source.row_count());
        for (row_index, fallback) in (0..source.row_count()).zip(1u64..) {
            let ordinal = match ordering_index {
                Some(col) => self.ordinal_from(source.cell(row_index, col)?)?,
                None => fallback,
            };
            let cells = visible
                .iter()
                .map(|&col| source.cell(row_index, col))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row { ordinal, cells });
        }

        tracing::trace!(
            "Introspected '{}': {} columns, {} rows",
            name,
            columns.len(),
            rows.len()
        );

        ResultSet::new(name, columns, rows)
    }

    fn ordinal_from(&self, value: CellValue) -> Result<u64> {
        let parsed = match &value {
            CellValue::Integer(n) => u64::try_from(*n).ok(),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            DiagError::query_failed(format!(
                "Ordering column '{}' holds a non-integer value",
                self.ordering_column
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_from_empty_source() {
        let source = MemorySource::new(["a", "b", "c"]);
        let columns = SchemaIntrospector::default().columns(&source).unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let rs = SchemaIntrospector::default().snapshot("empty", &source).unwrap();
        assert_eq!(rs.columns().len(), 3);
        assert!(rs.is_empty());
    }

    #[test]
    fn test_ordering_column_drives_row_order() {
        let source = MemorySource::new(["__row_number", "name"])
            .with_row([CellValue::Integer(2), "second".into()])
            .with_row([CellValue::Integer(1), "first".into()])
            .with_row([CellValue::Text("3".into()), "third".into()]);

        let rs = SchemaIntrospector::default().snapshot("ordered", &source).unwrap();
        assert_eq!(rs.columns().len(), 1);
        assert_eq!(rs.columns()[0].name, "name");
        let names: Vec<_> = rs
            .rows()
            .iter()
            .map(|r| r.cells[0].render_text().unwrap().into_owned())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_source_order_without_ordering_column() {
        let source = MemorySource::new(["v"]).with_row(["x"]).with_row(["y"]);
        let rs = SchemaIntrospector::default().snapshot("t", &source).unwrap();
        assert_eq!(rs.rows()[0].ordinal, 1);
        assert_eq!(rs.rows()[1].ordinal, 2);
    }

    #[test]
    fn test_bad_ordering_value() {
        let source = MemorySource::new(["__row_number", "v"]).with_row([CellValue::Float(1.5), "x".into()]);
        assert!(SchemaIntrospector::default().snapshot("t", &source).is_err());
    }

    #[test]
    fn test_duplicate_and_blank_columns() {
        let dup = MemorySource::new(["a", "a"]);
        assert!(matches!(
            SchemaIntrospector::default().columns(&dup),
            Err(DiagError::MalformedResult { .. })
        ));

        let blank = MemorySource::new(["a", " "]);
        assert!(matches!(
            SchemaIntrospector::default().columns(&blank),
            Err(DiagError::MalformedResult { .. })
        ));
    }

    #[test]
    fn test_custom_ordering_column() {
        let source = MemorySource::new(["rn", "v"])
            .with_row([CellValue::Integer(9), "late".into()])
            .with_row([CellValue::Integer(4), "early".into()]);
        let rs = SchemaIntrospector::new("rn").snapshot("t", &source).unwrap();
        assert_eq!(rs.rows()[0].ordinal, 4);
        assert_eq!(rs.columns().len(), 1);
    }
}
