//! A single fetched row.

use std::ops::Index;
use std::sync::Arc;

use crate::table::Cell;

/// An ordered sequence of named cells.
///
/// All rows of one fetch share the same column header allocation; lookups by
/// name are exact matches against those column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    cells: Vec<Cell>,
}

impl Row {
    /// Build a row over a shared column header. The caller guarantees that
    /// `cells` matches the header length.
    pub(crate) fn new(columns: Arc<[String]>, cells: Vec<Cell>) -> Self {
        debug_assert_eq!(columns.len(), cells.len());
        Self { columns, cells }
    }

    /// Column names, in fetch order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn header(&self) -> &Arc<[String]> {
        &self.columns
    }

    /// Number of cells in the row.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Cell under the named column, or `None` if no such column.
    pub fn get_named(&self, name: &str) -> Option<&Cell> {
        self.column_index(name).and_then(|i| self.cells.get(i))
    }

    /// Position of the named column within the header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Convert to a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .iter()
            .zip(&self.cells)
            .map(|(name, cell)| (name.clone(), cell.to_json()))
            .collect()
    }
}

impl Index<usize> for Row {
    type Output = Cell;

    fn index(&self, index: usize) -> &Cell {
        &self.cells[index]
    }
}

impl Index<&str> for Row {
    type Output = Cell;

    fn index(&self, name: &str) -> &Cell {
        self.get_named(name)
            .unwrap_or_else(|| panic!("no column named '{}'", name))
    }
}
