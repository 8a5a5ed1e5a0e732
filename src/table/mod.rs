//! Generic tabular result container.
//!
//! Materialized result sets land in a schema-less [`Table`]: an ordered set
//! of uniquely named columns and the [`Row`]s fetched under them, each row a
//! sequence of dynamically typed [`Cell`]s. None of these types know where
//! the data came from; the execution context fills them from a cursor.

mod cell;
mod row;
mod table;

pub use cell::Cell;
pub use row::Row;
pub use table::Table;
