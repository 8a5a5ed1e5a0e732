//! Bundled SQLite provider backed by rusqlite.
//!
//! SQLite maps cleanly onto the provider seam with two exceptions: result
//! sets cannot outlive their statement, so the reader buffers rows into a
//! [`BufferedCursor`], and stored procedures do not exist, so procedure
//! calls fail through the normal driver error path.
//!
//! Transactions are driven through `BEGIN`/`COMMIT`/`ROLLBACK` statements.
//! Isolation mapping: `Serializable` and `Snapshot` open `BEGIN EXCLUSIVE`,
//! `RepeatableRead` opens `BEGIN IMMEDIATE`, everything else defers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::params::Parameter;
use crate::provider::{
    BufferedCursor, Command, Connection, ConnectionProvider, Cursor, DriverResult,
    IsolationLevel, TransactionHandle,
};
use crate::value::SqlValue;

/// Where a SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSource {
    /// Private in-memory database, one per connection.
    Memory,
    /// Database file on disk, created when missing (unless read-only).
    File(PathBuf),
}

/// Provider configuration for SQLite connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteProvider {
    source: SqliteSource,
    #[serde(default)]
    read_only: bool,
}

impl SqliteProvider {
    /// Provider for a database file on disk.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: SqliteSource::File(path.into()),
            read_only: false,
        }
    }

    /// Provider for private in-memory databases.
    pub fn in_memory() -> Self {
        Self {
            source: SqliteSource::Memory,
            read_only: false,
        }
    }

    /// Open connections read-only. Ignored for in-memory databases.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn source(&self) -> &SqliteSource {
        &self.source
    }
}

impl ConnectionProvider for SqliteProvider {
    fn create_connection(&self) -> DriverResult<Box<dyn Connection>> {
        Ok(Box::new(SqliteConnection::new(self.clone())))
    }
}

/// One SQLite connection.
pub struct SqliteConnection {
    config: SqliteProvider,
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    fn new(config: SqliteProvider) -> Self {
        Self { config, conn: None }
    }

    fn connection(&self) -> DriverResult<&rusqlite::Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| "connection is not open".into())
    }
}

impl Connection for SqliteConnection {
    fn open(&mut self) -> DriverResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = match &self.config.source {
            SqliteSource::Memory => rusqlite::Connection::open_in_memory()?,
            SqliteSource::File(path) => {
                if self.config.read_only {
                    rusqlite::Connection::open_with_flags(
                        path,
                        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX
                            | rusqlite::OpenFlags::SQLITE_OPEN_URI,
                    )?
                } else {
                    rusqlite::Connection::open(path)?
                }
            }
        };
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, err)| err.into()),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn begin_transaction(
        &mut self,
        isolation: IsolationLevel,
    ) -> DriverResult<TransactionHandle> {
        self.connection()?.execute_batch(begin_sql(isolation))?;
        Ok(TransactionHandle::new(isolation))
    }

    fn commit(&mut self, _transaction: TransactionHandle) -> DriverResult<()> {
        self.connection()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self, _transaction: TransactionHandle) -> DriverResult<()> {
        self.connection()?.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn execute_non_query(&mut self, command: &Command) -> DriverResult<u64> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(command.text())?;
        bind_parameters(&mut stmt, command.parameters())?;
        let affected = stmt.raw_execute()?;
        Ok(affected as u64)
    }

    fn execute_reader<'c>(&'c mut self, command: &Command) -> DriverResult<Box<dyn Cursor + 'c>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(command.text())?;
        bind_parameters(&mut stmt, command.parameters())?;

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let field_count = columns.len();
        let mut rows = Vec::new();
        let mut result = stmt.raw_query();
        while let Some(row) = result.next()? {
            let mut values = Vec::with_capacity(field_count);
            for index in 0..field_count {
                let value: rusqlite::types::Value = row.get(index)?;
                values.push(from_driver_value(value));
            }
            rows.push(values);
        }
        Ok(Box::new(BufferedCursor::new(columns, rows)))
    }

    fn call_procedure(&mut self, _command: &mut Command) -> DriverResult<u64> {
        Err("SQLite does not support stored procedures".into())
    }
}

/// Bind named parameters (`:name` placeholders) onto a prepared statement.
fn bind_parameters(
    stmt: &mut rusqlite::Statement<'_>,
    parameters: &[Parameter],
) -> DriverResult<()> {
    for param in parameters {
        if param.direction().is_read_back() {
            return Err(format!(
                "parameter '{}' has a non-input direction, which SQLite statements do not support",
                param.name()
            )
            .into());
        }
        let key = format!(":{}", param.name());
        let index = stmt
            .parameter_index(&key)?
            .ok_or_else(|| format!("statement has no parameter named '{}'", key))?;
        stmt.raw_bind_parameter(index, to_driver_value(param.value()))?;
    }
    Ok(())
}

fn begin_sql(isolation: IsolationLevel) -> &'static str {
    match isolation {
        IsolationLevel::Serializable | IsolationLevel::Snapshot => "BEGIN EXCLUSIVE",
        IsolationLevel::RepeatableRead => "BEGIN IMMEDIATE",
        _ => "BEGIN DEFERRED",
    }
}

fn to_driver_value(value: &SqlValue) -> rusqlite::types::Value {
    match value {
        SqlValue::Null => rusqlite::types::Value::Null,
        SqlValue::Integer(v) => rusqlite::types::Value::Integer(*v),
        SqlValue::Real(v) => rusqlite::types::Value::Real(*v),
        SqlValue::Text(v) => rusqlite::types::Value::Text(v.clone()),
        SqlValue::Blob(v) => rusqlite::types::Value::Blob(v.clone()),
    }
}

fn from_driver_value(value: rusqlite::types::Value) -> SqlValue {
    match value {
        rusqlite::types::Value::Null => SqlValue::Null,
        rusqlite::types::Value::Integer(v) => SqlValue::Integer(v),
        rusqlite::types::Value::Real(v) => SqlValue::Real(v),
        rusqlite::types::Value::Text(v) => SqlValue::Text(v),
        rusqlite::types::Value::Blob(v) => SqlValue::Blob(v),
    }
}
