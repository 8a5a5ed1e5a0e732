//! Schema-less tabular container.

use std::sync::Arc;

use crate::error::{DalError, DalResult};
use crate::table::{Cell, Row};
use crate::value::SqlValue;

/// An ordered collection of rows over an ordered, uniquely named column set.
///
/// Built incrementally: columns first, rows after. The column set freezes as
/// soon as the first row is appended, and every appended row must match the
/// column count. Rows can only be removed through [`Table::delete_where`].
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    header: Option<Arc<[String]>>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with the given columns.
    pub fn with_columns<I, S>(names: I) -> DalResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for name in names {
            table.add_column(name)?;
        }
        Ok(table)
    }

    /// Add a column. Fails on a duplicate name, and once any row has been
    /// appended the column set is frozen.
    pub fn add_column(&mut self, name: impl Into<String>) -> DalResult<()> {
        if !self.rows.is_empty() {
            return Err(DalError::precondition(
                "columns are frozen once rows have been appended",
            ));
        }
        let name = name.into();
        if self.columns.iter().any(|c| *c == name) {
            return Err(DalError::duplicate_column(name));
        }
        self.columns.push(name);
        self.header = None;
        Ok(())
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Append a row of values in column order.
    pub fn append(&mut self, values: Vec<SqlValue>) -> DalResult<()> {
        if values.len() != self.columns.len() {
            return Err(DalError::column_count_mismatch(
                self.columns.len(),
                values.len(),
            ));
        }
        let header = self
            .header
            .get_or_insert_with(|| Arc::from(self.columns.clone()))
            .clone();
        let cells = values.into_iter().map(Cell::from).collect();
        self.rows.push(Row::new(header, cells));
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row of the table, if any.
    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Delete every row for which `predicate` returns true. Returns the
    /// number of rows removed.
    pub fn delete_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| !predicate(row));
        before - self.rows.len()
    }

    /// Convert to a list of JSON objects, one per row.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows.iter().map(Row::to_json).collect()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
