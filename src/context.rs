//! Execution context: one connection, at most one active transaction.
//!
//! The context owns its connection exclusively and is shared across threads
//! as `Arc<ExecutionContext>`. Two separate guards protect it: a narrow
//! mutex over the transaction state (begin/commit/rollback and command
//! attachment), and a connection mutex serializing driver interaction.
//! Locks are taken in that order and never the other way around. Row
//! callbacks and filters always run after the connection guard is released.
//!
//! Error policy: precondition violations always surface; statement failures
//! are logged with their full source chain and returned as errors for the
//! caller to propagate or default away; commit and rollback driver failures
//! are logged and swallowed once the precondition held.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DalError, DalResult, DriverResult, StatementKind};
use crate::params::Parameter;
use crate::provider::{Command, Connection, Cursor, IsolationLevel, TransactionHandle};
use crate::table::{Cell, Row, Table};
use crate::trace;

/// Field selector for first-row lookups: by position or by column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl FieldRef<'_> {
    fn lookup<'r>(&self, row: &'r Row) -> Option<&'r Cell> {
        match self {
            Self::Index(index) => row.get(*index),
            Self::Name(name) => row.get_named(name),
        }
    }
}

impl From<usize> for FieldRef<'_> {
    fn from(index: usize) -> Self {
        FieldRef::Index(index)
    }
}

impl<'a> From<&'a str> for FieldRef<'a> {
    fn from(name: &'a str) -> Self {
        FieldRef::Name(name)
    }
}

impl std::fmt::Display for FieldRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "index {}", index),
            Self::Name(name) => write!(f, "column '{}'", name),
        }
    }
}

/// Owner of one database connection and its transaction state.
pub struct ExecutionContext {
    connection: Mutex<Box<dyn Connection>>,
    transaction: Mutex<Option<TransactionHandle>>,
}

impl ExecutionContext {
    /// Create a context over `connection`, opening it.
    pub fn new(mut connection: Box<dyn Connection>) -> DalResult<Self> {
        connection.open().map_err(|err| {
            trace::log_error_chain(err.as_ref());
            DalError::connection("failed to open the connection", err)
        })?;
        Ok(Self {
            connection: Mutex::new(connection),
            transaction: Mutex::new(None),
        })
    }

    /// Create a context on a fresh connection from `provider`.
    pub fn connect(provider: &dyn crate::provider::ConnectionProvider) -> DalResult<Self> {
        let connection = provider.create_connection().map_err(|err| {
            trace::log_error_chain(err.as_ref());
            DalError::connection("failed to create a connection", err)
        })?;
        Self::new(connection)
    }

    /// Open the connection. No-op when already open.
    pub fn open(&self) -> DalResult<()> {
        self.connection.lock().open().map_err(|err| {
            trace::log_error_chain(err.as_ref());
            DalError::connection("failed to open the connection", err)
        })
    }

    /// Close the connection. No-op when already closed.
    pub fn close(&self) -> DalResult<()> {
        self.connection.lock().close().map_err(|err| {
            trace::log_error_chain(err.as_ref());
            DalError::connection("failed to close the connection", err)
        })
    }

    pub fn is_open(&self) -> bool {
        self.connection.lock().is_open()
    }

    // ========================================================================
    // Statement execution
    // ========================================================================

    /// Run a query and invoke `on_row` for every fetched row.
    pub fn execute_select<F>(&self, sql: &str, params: &[Parameter], on_row: F) -> DalResult<()>
    where
        F: FnMut(&Row),
    {
        self.execute_select_filtered(sql, params, |_| true, on_row)
    }

    /// Run a query and invoke `on_row` for every fetched row that passes
    /// `filter`. The filter sees each row before the callback does.
    pub fn execute_select_filtered<P, F>(
        &self,
        sql: &str,
        params: &[Parameter],
        mut filter: P,
        mut on_row: F,
    ) -> DalResult<()>
    where
        P: FnMut(&Row) -> bool,
        F: FnMut(&Row),
    {
        let rows = self.fetch_rows(sql, params)?;
        for row in &rows {
            if filter(row) {
                on_row(row);
            }
        }
        Ok(())
    }

    /// Run a query and materialize the full result set into a [`Table`].
    pub fn execute_select_to_table(&self, sql: &str, params: &[Parameter]) -> DalResult<Table> {
        self.execute_select_to_table_filtered(sql, params, |_| true)
    }

    /// Run a query into a [`Table`], then delete every materialized row that
    /// fails `filter`. The filter runs as a post-fetch delete pass: all rows
    /// are appended first, unlike the callback variant which skips rows
    /// before invoking the callback.
    pub fn execute_select_to_table_filtered<P>(
        &self,
        sql: &str,
        params: &[Parameter],
        mut filter: P,
    ) -> DalResult<Table>
    where
        P: FnMut(&Row) -> bool,
    {
        let mut table = Table::new();
        self.run_reader(sql, params, |cursor| {
            for index in 0..cursor.field_count() {
                let name = cursor.field_name(index).unwrap_or_default().to_string();
                table.add_column(name).map_err(driver_error)?;
            }
            while cursor.advance()? {
                let mut values = Vec::with_capacity(cursor.field_count());
                for index in 0..cursor.field_count() {
                    values.push(cursor.value(index)?);
                }
                table.append(values).map_err(driver_error)?;
            }
            Ok(())
        })?;
        let removed = table.delete_where(|row| !filter(row));
        if removed > 0 {
            debug!(removed, "Post-fetch filter removed rows from materialized table");
        }
        Ok(table)
    }

    /// Return the first row's cell at `field`. Zero fetched rows yield a
    /// NULL cell, not an error.
    pub fn field_value<'a>(
        &self,
        field: impl Into<FieldRef<'a>>,
        sql: &str,
        params: &[Parameter],
    ) -> DalResult<Cell> {
        Ok(self
            .try_field_value(field, sql, params)?
            .unwrap_or_else(Cell::null))
    }

    /// Return the first row's cell at `field`, or `None` when the query
    /// fetched no rows.
    pub fn try_field_value<'a>(
        &self,
        field: impl Into<FieldRef<'a>>,
        sql: &str,
        params: &[Parameter],
    ) -> DalResult<Option<Cell>> {
        let field = field.into();
        let mut cell: Option<Cell> = None;
        let mut missing_field = false;
        self.run_reader(sql, params, |cursor| {
            if cursor.advance()? {
                let header = read_header(cursor);
                let row = read_row(cursor, &header)?;
                match field.lookup(&row) {
                    Some(found) => cell = Some(found.clone()),
                    None => missing_field = true,
                }
            }
            Ok(())
        })?;
        if missing_field {
            return Err(DalError::field_not_found(field));
        }
        Ok(cell)
    }

    /// Execute a non-select statement and return the affected-row count.
    pub fn execute_non_query(&self, sql: &str, params: &[Parameter]) -> DalResult<u64> {
        let command = self.create_command(sql, params);
        let mut conn = self.connection.lock();
        let result = conn.execute_non_query(&command);
        drop(conn);
        match result {
            Ok(affected) => {
                trace::statement(&command, affected);
                Ok(affected)
            }
            Err(err) => {
                trace::log_error_chain(err.as_ref());
                Err(DalError::statement(StatementKind::NonQuery, err))
            }
        }
    }

    /// Call a stored procedure. After execution the values of all output
    /// and input-output parameters are collected into a name-to-cell map;
    /// the map is empty when every parameter is input-only.
    pub fn execute_stored_procedure(
        &self,
        name: &str,
        params: &[Parameter],
    ) -> DalResult<BTreeMap<String, Cell>> {
        let mut command = Command::procedure(name, params.to_vec());
        self.attach_active_transaction(&mut command);

        let mut conn = self.connection.lock();
        let result = conn.call_procedure(&mut command);
        drop(conn);

        let affected = match result {
            Ok(affected) => affected,
            Err(err) => {
                trace::log_error_chain(err.as_ref());
                trace::statement(&command, 0);
                return Err(DalError::statement(StatementKind::StoredProcedure, err));
            }
        };
        trace::statement(&command, affected);

        let mut outputs = BTreeMap::new();
        for param in command.parameters() {
            if param.direction().is_read_back() {
                outputs.insert(param.name().to_string(), Cell::new(param.value().clone()));
            }
        }
        Ok(outputs)
    }

    /// Build a command for this context's connection, attached to the
    /// active transaction if one exists.
    pub fn create_command(&self, sql: impl Into<String>, params: &[Parameter]) -> Command {
        let mut command = Command::statement(sql, params.to_vec());
        self.attach_active_transaction(&mut command);
        command
    }

    /// Attachment happens under the transaction state guard.
    fn attach_active_transaction(&self, command: &mut Command) {
        let tx = self.transaction.lock();
        if let Some(handle) = tx.as_ref() {
            command.attach_transaction(handle.id());
        }
    }

    /// Guarded reader execution: trace, run `handle` over the cursor while
    /// the connection guard is held, wrap any driver failure.
    fn run_reader<F>(&self, sql: &str, params: &[Parameter], handle: F) -> DalResult<()>
    where
        F: FnOnce(&mut dyn Cursor) -> DriverResult<()>,
    {
        let command = self.create_command(sql, params);
        // Reads trace before execution; the affected count is not known yet.
        trace::statement(&command, 0);
        let mut conn = self.connection.lock();
        let result = read_with_cursor(conn.as_mut(), &command, handle);
        drop(conn);
        result.map_err(|err| {
            trace::log_error_chain(err.as_ref());
            DalError::statement(StatementKind::Select, err)
        })
    }

    /// Fetch the full result set as rows sharing one column header.
    fn fetch_rows(&self, sql: &str, params: &[Parameter]) -> DalResult<Vec<Row>> {
        let mut rows = Vec::new();
        self.run_reader(sql, params, |cursor| {
            let header = read_header(cursor);
            while cursor.advance()? {
                rows.push(read_row(cursor, &header)?);
            }
            Ok(())
        })?;
        Ok(rows)
    }

    // ========================================================================
    // Transaction control
    // ========================================================================

    /// Start a transaction. The connection must be open. When a transaction
    /// is already active the call is a silent no-op; the active transaction
    /// is never replaced.
    pub fn begin_transaction(&self, isolation: IsolationLevel) -> DalResult<()> {
        let mut tx = self.transaction.lock();
        let mut conn = self.connection.lock();
        if !conn.is_open() {
            return Err(DalError::precondition("the connection is not open"));
        }
        if tx.is_some() {
            debug!("Transaction already active, begin ignored");
            return Ok(());
        }
        match conn.begin_transaction(isolation) {
            Ok(handle) => {
                info!(transaction_id = %handle.id(), ?isolation, "Transaction started");
                *tx = Some(handle);
                Ok(())
            }
            Err(err) => {
                trace::log_error_chain(err.as_ref());
                Err(DalError::transaction_begin(err))
            }
        }
    }

    /// Start a transaction at the default isolation level.
    pub fn begin_default_transaction(&self) -> DalResult<()> {
        self.begin_transaction(IsolationLevel::default())
    }

    /// Commit the active transaction. Requires one; raises a precondition
    /// error otherwise. A driver failure during the commit itself is logged
    /// and swallowed, and the transaction handle is cleared regardless.
    pub fn commit(&self) -> DalResult<()> {
        let mut tx = self.transaction.lock();
        let handle = tx.take().ok_or_else(|| {
            DalError::precondition("there is no active transaction to commit")
        })?;
        let id = handle.id().to_string();
        let mut conn = self.connection.lock();
        if let Err(err) = conn.commit(handle) {
            trace::log_error_chain(err.as_ref());
            warn!(transaction_id = %id, "Driver failure during commit, handle cleared");
        } else {
            info!(transaction_id = %id, "Transaction committed");
        }
        Ok(())
    }

    /// Roll back the active transaction. Same contract as [`Self::commit`]:
    /// the precondition always surfaces, driver failures never do.
    pub fn rollback(&self) -> DalResult<()> {
        let mut tx = self.transaction.lock();
        let handle = tx.take().ok_or_else(|| {
            DalError::precondition("there is no active transaction to roll back")
        })?;
        let id = handle.id().to_string();
        let mut conn = self.connection.lock();
        if let Err(err) = conn.rollback(handle) {
            trace::log_error_chain(err.as_ref());
            warn!(transaction_id = %id, "Driver failure during rollback, handle cleared");
        } else {
            info!(transaction_id = %id, "Transaction rolled back");
        }
        Ok(())
    }

    pub fn has_active_transaction(&self) -> bool {
        self.transaction.lock().is_some()
    }

    /// Id of the active transaction, if any.
    pub fn transaction_id(&self) -> Option<String> {
        self.transaction.lock().as_ref().map(|tx| tx.id().to_string())
    }

    /// Begin a transaction, run `action`, commit. On any error the active
    /// transaction is rolled back and the error is returned.
    pub fn run_in_transaction<T, F>(&self, isolation: IsolationLevel, action: F) -> DalResult<T>
    where
        F: FnOnce() -> DalResult<T>,
    {
        self.run_in_transaction_with(isolation, action, |_| {})
    }

    /// [`Self::run_in_transaction`] with an error hook: on failure, after
    /// the rollback, `on_error` observes the error before it is returned.
    pub fn run_in_transaction_with<T, F, E>(
        &self,
        isolation: IsolationLevel,
        action: F,
        on_error: E,
    ) -> DalResult<T>
    where
        F: FnOnce() -> DalResult<T>,
        E: FnOnce(&DalError),
    {
        let outcome = self
            .begin_transaction(isolation)
            .and_then(|_| action())
            .and_then(|value| self.commit().map(|_| value));
        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.has_active_transaction() {
                    if let Err(rollback_err) = self.rollback() {
                        warn!(error = %rollback_err, "Rollback after failed transactional action failed");
                    }
                }
                on_error(&err);
                Err(err)
            }
        }
    }

    // ========================================================================
    // Disposal
    // ========================================================================

    /// Roll back any active transaction, then close the connection.
    fn dispose(&mut self) {
        if let Some(handle) = self.transaction.get_mut().take() {
            let id = handle.id().to_string();
            if let Err(err) = self.connection.get_mut().rollback(handle) {
                trace::log_error_chain(err.as_ref());
                warn!(transaction_id = %id, "Rollback during disposal failed");
            } else {
                info!(transaction_id = %id, "Open transaction rolled back during disposal");
            }
        }
        let conn = self.connection.get_mut();
        if conn.is_open() {
            if let Err(err) = conn.close() {
                trace::log_error_chain(err.as_ref());
            }
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext").finish_non_exhaustive()
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Column names of the cursor, in field order.
fn read_header(cursor: &dyn Cursor) -> Arc<[String]> {
    let names: Vec<String> = (0..cursor.field_count())
        .map(|index| cursor.field_name(index).unwrap_or_default().to_string())
        .collect();
    Arc::from(names)
}

/// One row off the current cursor position.
fn read_row(cursor: &dyn Cursor, header: &Arc<[String]>) -> DriverResult<Row> {
    let mut cells = Vec::with_capacity(header.len());
    for index in 0..header.len() {
        cells.push(Cell::new(cursor.value(index)?));
    }
    Ok(Row::new(header.clone(), cells))
}

fn read_with_cursor<F>(
    conn: &mut dyn Connection,
    command: &Command,
    handle: F,
) -> DriverResult<()>
where
    F: FnOnce(&mut dyn Cursor) -> DriverResult<()>,
{
    let mut cursor = conn.execute_reader(command)?;
    handle(cursor.as_mut())
}

/// Container errors raised while a cursor is being drained propagate as
/// driver-level failures of the surrounding statement.
fn driver_error(err: DalError) -> crate::error::DriverError {
    Box::new(err)
}
