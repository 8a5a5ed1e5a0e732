//! Diagnostics for executed statements.
//!
//! Every statement execution emits a trace record carrying the statement
//! text, its parameters and the affected-row count. Emission is fire and
//! forget: a missing or slow subscriber never changes the outcome of the
//! statement that produced the record.

use tracing::{debug, error};

use crate::provider::{Command, CommandKind};

/// Target under which statement traces are emitted. Subscribers can filter
/// on it independently of the rest of the crate's log output.
pub const STATEMENT_TARGET: &str = "sqldal::stmt";

/// Emit the trace record for an executed statement.
pub(crate) fn statement(command: &Command, rows_affected: u64) {
    debug!(
        target: STATEMENT_TARGET,
        rows_affected,
        transaction_id = ?command.transaction_id(),
        "{}",
        render_statement(command, rows_affected)
    );
}

/// Render the human-readable trace block: the statement text followed by
/// one line per parameter and the affected-row count. Procedure calls are
/// marked so they stand out from plain statement text.
pub(crate) fn render_statement(command: &Command, rows_affected: u64) -> String {
    let mut out = String::from("Executed Query:\n");
    if command.kind() == CommandKind::StoredProcedure {
        out.push_str("[STORED PROCEDURE]: ");
    }
    out.push_str(command.text());
    for param in command.parameters() {
        out.push('\n');
        out.push_str(&param.to_string());
    }
    out.push_str(&format!("\n-- {} row(s) affected", rows_affected));
    out
}

/// Log `err` and every error below it, one record per link in the chain.
pub(crate) fn log_error_chain(err: &(dyn std::error::Error + 'static)) {
    for (depth, message) in error_chain(err).into_iter().enumerate() {
        if depth == 0 {
            error!("{}", message);
        } else {
            error!(depth, "caused by: {}", message);
        }
    }
}

/// Messages of `err` and its transitive sources, outermost first.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut messages = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DalError, StatementKind};
    use crate::params::Parameter;

    #[test]
    fn test_render_carries_sql_parameters_and_count() {
        let command = Command::statement(
            "SELECT name FROM users WHERE id = :id",
            vec![Parameter::input("id", 7)],
        );
        let rendered = render_statement(&command, 3);
        assert!(rendered.starts_with("Executed Query:\n"));
        assert!(rendered.contains("SELECT name FROM users WHERE id = :id"));
        assert!(rendered.contains("id = 7"));
        assert!(rendered.ends_with("3 row(s) affected"));
    }

    #[test]
    fn test_render_marks_stored_procedures() {
        let command = Command::procedure(
            "compute_totals",
            vec![Parameter::input("year", 2024)],
        );
        let rendered = render_statement(&command, 1);
        assert!(rendered.contains("[STORED PROCEDURE]: compute_totals"));
        assert!(rendered.contains("year = 2024"));
    }

    #[test]
    fn test_render_without_parameters() {
        let command = Command::statement("DELETE FROM logs", Vec::new());
        assert_eq!(
            render_statement(&command, 0),
            "Executed Query:\nDELETE FROM logs\n-- 0 row(s) affected"
        );
    }

    #[test]
    fn test_error_chain_walks_every_source() {
        let driver = std::io::Error::new(std::io::ErrorKind::Other, "socket reset");
        let statement = DalError::statement(StatementKind::Select, driver);
        let outer = DalError::connection("context tear-down failed", statement);

        let chain = error_chain(&outer);
        assert_eq!(chain.len(), 3);
        assert!(chain[0].contains("context tear-down failed"));
        assert!(chain[1].contains("select statement"));
        assert!(chain[2].contains("socket reset"));
    }

    #[test]
    fn test_error_chain_of_a_leaf_error() {
        let err = DalError::precondition("no transaction");
        assert_eq!(error_chain(&err).len(), 1);
    }
}
