//! Statement parameters.
//!
//! Parameters are passed by the caller into every execute call as an ordered
//! list. Input parameters are consumed read-only; output and input-output
//! parameters are written back by the provider after a stored procedure call
//! and collected into the result map by the execution context.

use serde::{Deserialize, Serialize};

use crate::value::SqlValue;

/// Direction of a statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamDirection {
    Input,
    Output,
    InputOutput,
}

impl ParamDirection {
    /// Get the display name for this direction.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::InputOutput => "input-output",
        }
    }

    /// Check if the database writes this parameter back after execution.
    pub fn is_read_back(&self) -> bool {
        !matches!(self, Self::Input)
    }
}

impl std::fmt::Display for ParamDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Declared database type of a parameter.
///
/// Providers that do not need a declaration (SQLite) ignore the tag; typed
/// drivers use it to pick the wire type for output parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
    DateTime,
}

impl SqlType {
    /// Infer the closest type tag for a value.
    pub fn of(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null | SqlValue::Text(_) => Self::Text,
            SqlValue::Integer(_) => Self::Integer,
            SqlValue::Real(_) => Self::Real,
            SqlValue::Blob(_) => Self::Blob,
        }
    }

    /// Get the display name for this type tag.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A single statement parameter: name, value, direction and type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: SqlValue,
    direction: ParamDirection,
    sql_type: SqlType,
}

impl Parameter {
    /// Create an input parameter. The type tag is inferred from the value.
    pub fn input(name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            sql_type: SqlType::of(&value),
            value,
            direction: ParamDirection::Input,
        }
    }

    /// Create an output parameter. Its value starts as NULL and is populated
    /// by the provider after a stored procedure call.
    pub fn output(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            value: SqlValue::Null,
            direction: ParamDirection::Output,
            sql_type,
        }
    }

    /// Create an input-output parameter.
    pub fn input_output(name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            sql_type: SqlType::of(&value),
            value,
            direction: ParamDirection::InputOutput,
        }
    }

    /// Override the inferred type tag.
    pub fn with_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = sql_type;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    /// Replace the value. Used by providers to write non-input parameters
    /// back after execution.
    pub fn set_value(&mut self, value: SqlValue) {
        self.value = value;
    }

    pub fn direction(&self) -> ParamDirection {
        self.direction
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {} ({}, {})",
            self.name, self.value, self.direction, self.sql_type
        )
    }
}
