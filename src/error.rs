//! Error types for the data access layer.
//!
//! This module defines all error types using `thiserror`. Precondition
//! violations are kept apart from driver-level statement failures because the
//! two follow different propagation rules: preconditions are always surfaced,
//! while statement failures are logged with their full source chain and then
//! returned for the caller to handle or default away.

use thiserror::Error;

/// Boxed driver-level error produced by a provider implementation.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for provider trait methods.
pub type DriverResult<T> = Result<T, DriverError>;

/// Kind of statement whose execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    NonQuery,
    StoredProcedure,
}

impl StatementKind {
    /// Get the display name for this statement kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Select => "select statement",
            Self::NonQuery => "non-query statement",
            Self::StoredProcedure => "stored procedure call",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Error, Debug)]
pub enum DalError {
    /// Violated call-ordering requirement. Never suppressed by callers.
    #[error("Precondition violated: {message}")]
    Precondition { message: String },

    /// Driver failure while opening or closing a connection.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: DriverError,
    },

    #[error("Provider not registered: {provider_id}")]
    ProviderNotFound { provider_id: String },

    #[error("No pooled context under key {key}")]
    PoolKeyNotFound { key: i64 },

    #[error("No named context under key '{key}'")]
    NamedKeyNotFound { key: String },

    /// Driver failure while executing a statement. The source chain carries
    /// the native driver error.
    #[error("Error executing {kind}, see source for details")]
    Statement {
        kind: StatementKind,
        #[source]
        source: DriverError,
    },

    /// Driver failure while opening a transaction. Always surfaced.
    #[error("Error trying to begin a transaction, see source for details")]
    TransactionBegin {
        #[source]
        source: DriverError,
    },

    #[error("Column '{name}' already exists in the table")]
    DuplicateColumn { name: String },

    #[error("Row has {actual} values but the table has {expected} columns")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Field not found: {field}")]
    FieldNotFound { field: String },
}

impl DalError {
    /// Create a precondition violation.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Wrap a driver error raised by the connection lifecycle.
    pub fn connection(message: impl Into<String>, source: impl Into<DriverError>) -> Self {
        Self::Connection {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Create a provider lookup failure.
    pub fn provider_not_found(provider_id: impl Into<String>) -> Self {
        Self::ProviderNotFound {
            provider_id: provider_id.into(),
        }
    }

    /// Create a pool lookup failure.
    pub fn pool_key_not_found(key: i64) -> Self {
        Self::PoolKeyNotFound { key }
    }

    /// Create a named registry lookup failure.
    pub fn named_key_not_found(key: impl Into<String>) -> Self {
        Self::NamedKeyNotFound { key: key.into() }
    }

    /// Wrap a driver error raised while executing a statement.
    pub fn statement(kind: StatementKind, source: impl Into<DriverError>) -> Self {
        Self::Statement {
            kind,
            source: source.into(),
        }
    }

    /// Wrap a driver error raised while beginning a transaction.
    pub fn transaction_begin(source: impl Into<DriverError>) -> Self {
        Self::TransactionBegin {
            source: source.into(),
        }
    }

    /// Create a duplicate column error.
    pub fn duplicate_column(name: impl Into<String>) -> Self {
        Self::DuplicateColumn { name: name.into() }
    }

    /// Create a column count mismatch error.
    pub fn column_count_mismatch(expected: usize, actual: usize) -> Self {
        Self::ColumnCountMismatch { expected, actual }
    }

    /// Create a field lookup failure.
    pub fn field_not_found(field: impl std::fmt::Display) -> Self {
        Self::FieldNotFound {
            field: field.to_string(),
        }
    }

    /// Check if this error is a precondition violation.
    ///
    /// Precondition violations must reach the caller on every code path;
    /// they are never converted into a default value.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }

    /// Check if this error wraps a driver-level statement failure.
    pub fn is_statement_failure(&self) -> bool {
        matches!(self, Self::Statement { .. })
    }
}

/// Result type alias for data access operations.
pub type DalResult<T> = Result<T, DalError>;
