//! Synchronous, provider-agnostic data access layer
//!
//! This library wraps driver-level database connections behind a small
//! execution surface: an [`ExecutionContext`] owns one connection and at
//! most one transaction, a [`DataCenter`] keeps pooled and named contexts,
//! and providers plug in through the traits in [`provider`].

pub mod context;
pub mod error;
pub mod params;
pub mod provider;
pub mod registry;
pub mod table;
mod trace;
pub mod value;

pub use context::{ExecutionContext, FieldRef};
pub use error::{DalError, DalResult, DriverError, DriverResult, StatementKind};
pub use params::{ParamDirection, Parameter, SqlType};
pub use provider::{Command, Connection, ConnectionProvider, Cursor, IsolationLevel};
pub use registry::DataCenter;
pub use table::{Cell, Row, Table};
pub use trace::STATEMENT_TARGET;
pub use value::SqlValue;
