//! Provider seam: the driver-facing traits of the data access layer.
//!
//! A [`ConnectionProvider`] manufactures [`Connection`]s; a connection
//! executes [`Command`]s and hands result sets back as forward-only
//! [`Cursor`]s. Everything above this module is driver-agnostic: the
//! execution context only ever talks to these traits.
//!
//! Driver errors cross the seam as [`DriverError`] (any boxed error type);
//! the context decides how each one propagates.

#[cfg(feature = "sqlite")]
pub mod sqlite;

use serde::{Deserialize, Serialize};

pub use crate::error::{DriverError, DriverResult};
use crate::params::Parameter;
use crate::value::SqlValue;

/// Requested isolation level for a transaction.
///
/// Providers map levels they do not support onto the closest stricter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    Unspecified,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

/// Opaque handle for one active transaction.
///
/// Returned by [`Connection::begin_transaction`] and consumed by commit or
/// rollback. The id appears in statement traces and attached commands.
#[derive(Debug)]
pub struct TransactionHandle {
    id: String,
    isolation: IsolationLevel,
}

impl TransactionHandle {
    pub fn new(isolation: IsolationLevel) -> Self {
        Self {
            id: generate_transaction_id(),
            isolation,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }
}

/// Generate a unique transaction identifier.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

/// How a command's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Plain SQL text.
    Text,
    /// Name of a stored procedure to call.
    StoredProcedure,
}

/// A statement plus everything needed to execute it: parameters and, when
/// one is active, the transaction it runs under.
#[derive(Debug, Clone)]
pub struct Command {
    text: String,
    kind: CommandKind,
    parameters: Vec<Parameter>,
    transaction_id: Option<String>,
}

impl Command {
    /// Create a plain SQL command.
    pub fn statement(sql: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            text: sql.into(),
            kind: CommandKind::Text,
            parameters,
            transaction_id: None,
        }
    }

    /// Create a stored procedure call.
    pub fn procedure(name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            text: name.into(),
            kind: CommandKind::StoredProcedure,
            parameters,
            transaction_id: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Mutable parameter access, used by providers to write output values
    /// back after a procedure call.
    pub fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    /// Attach the transaction this command runs under.
    pub fn attach_transaction(&mut self, transaction_id: impl Into<String>) {
        self.transaction_id = Some(transaction_id.into());
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
}

/// Capability that creates new connections from its own configuration.
pub trait ConnectionProvider: Send + Sync {
    /// Create a connection. Connections come back unopened; the execution
    /// context opens them on construction.
    fn create_connection(&self) -> DriverResult<Box<dyn Connection>>;
}

/// One database connection as the execution context consumes it.
pub trait Connection: Send {
    /// Open the connection. Must be a no-op when already open.
    fn open(&mut self) -> DriverResult<()>;

    /// Close the connection. Must be a no-op when already closed.
    fn close(&mut self) -> DriverResult<()>;

    fn is_open(&self) -> bool;

    /// Start a transaction at the given isolation level.
    fn begin_transaction(&mut self, isolation: IsolationLevel)
    -> DriverResult<TransactionHandle>;

    /// Commit the transaction, consuming its handle.
    fn commit(&mut self, transaction: TransactionHandle) -> DriverResult<()>;

    /// Roll the transaction back, consuming its handle.
    fn rollback(&mut self, transaction: TransactionHandle) -> DriverResult<()>;

    /// Execute a statement that returns no rows. Returns the affected count.
    fn execute_non_query(&mut self, command: &Command) -> DriverResult<u64>;

    /// Execute a query and return a forward-only cursor over its result set.
    /// The cursor may borrow the connection until it is dropped.
    fn execute_reader<'c>(&'c mut self, command: &Command) -> DriverResult<Box<dyn Cursor + 'c>>;

    /// Execute a stored procedure call. Providers write the values of
    /// output and input-output parameters back into `command`.
    fn call_procedure(&mut self, command: &mut Command) -> DriverResult<u64>;
}

/// Forward-only view over a result set.
///
/// A cursor starts positioned before the first row; [`Cursor::advance`]
/// moves it forward and reports whether a row is available.
pub trait Cursor {
    fn field_count(&self) -> usize;

    /// Name of the field at `index`, or `None` if out of range.
    fn field_name(&self, index: usize) -> Option<&str>;

    /// Move to the next row. Returns false once the result set is exhausted.
    fn advance(&mut self) -> DriverResult<bool>;

    /// Value of the field at `index` in the current row.
    fn value(&self, index: usize) -> DriverResult<SqlValue>;

    /// Value of the named field in the current row.
    fn value_named(&self, name: &str) -> DriverResult<SqlValue> {
        let index = (0..self.field_count())
            .find(|&i| self.field_name(i) == Some(name))
            .ok_or_else(|| format!("no field named '{}'", name))?;
        self.value(index)
    }
}

/// An owned, fully materialized cursor.
///
/// Providers whose native result sets cannot outlive a statement buffer
/// everything into one of these and hand it back; tests script result sets
/// with it directly.
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    current: Option<usize>,
    next: usize,
}

impl BufferedCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows,
            current: None,
            next: 0,
        }
    }

    /// A cursor over zero columns and zero rows.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Cursor for BufferedCursor {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn advance(&mut self) -> DriverResult<bool> {
        if self.next < self.rows.len() {
            self.current = Some(self.next);
            self.next += 1;
            Ok(true)
        } else {
            self.current = None;
            Ok(false)
        }
    }

    fn value(&self, index: usize) -> DriverResult<SqlValue> {
        let row = self
            .current
            .and_then(|i| self.rows.get(i))
            .ok_or("cursor is not positioned on a row")?;
        row.get(index)
            .cloned()
            .ok_or_else(|| format!("field index {} out of range", index).into())
    }
}
