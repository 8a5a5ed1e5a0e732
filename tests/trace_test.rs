//! Integration tests for executed-statement tracing.
//!
//! Statement traces are emitted through `tracing` at debug level. Reads are
//! traced before execution with a zero affected count; writes are traced
//! after success with the real count. Driver failures are logged with their
//! message before the wrapped error returns to the caller.

use std::sync::Arc;

use parking_lot::Mutex;
use sqldal::provider::sqlite::SqliteProvider;
use sqldal::{ExecutionContext, Parameter};

#[derive(Clone)]
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `action` with a capturing subscriber and return everything logged.
fn capture_logs(action: impl FnOnce()) -> String {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(SharedWriter(buffer.clone()))
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, action);
    let bytes = buffer.lock().clone();
    String::from_utf8(bytes).expect("log output is UTF-8")
}

fn seeded_context() -> ExecutionContext {
    let ctx =
        ExecutionContext::connect(&SqliteProvider::in_memory()).expect("open in-memory db");
    ctx.execute_non_query("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .expect("create table");
    ctx
}

#[test]
fn test_select_is_traced_before_execution() {
    let ctx = seeded_context();

    let logs = capture_logs(|| {
        ctx.execute_select("SELECT id, name FROM items", &[], |_| {})
            .expect("select");
    });

    assert!(logs.contains("Executed Query:"));
    assert!(logs.contains("SELECT id, name FROM items"));
    // Reads are traced up front, so the affected count is the placeholder.
    assert!(logs.contains("0 row(s) affected"));
}

#[test]
fn test_non_query_trace_carries_the_real_count() {
    let ctx = seeded_context();

    let logs = capture_logs(|| {
        for id in 0..3 {
            ctx.execute_non_query(
                "INSERT INTO items (id, name) VALUES (:id, :name)",
                &[
                    Parameter::input("id", id),
                    Parameter::input("name", "widget"),
                ],
            )
            .expect("insert");
        }
        ctx.execute_non_query("UPDATE items SET name = 'gadget'", &[])
            .expect("update");
    });

    assert!(logs.contains("1 row(s) affected"));
    assert!(logs.contains("3 row(s) affected"));
    // Parameters appear one per line in the rendered block.
    assert!(logs.contains("name = widget (input, text)"));
}

#[test]
fn test_driver_failure_is_logged_before_it_returns() {
    let ctx = seeded_context();

    let logs = capture_logs(|| {
        let _ = ctx.execute_non_query("INSERT INTO missing (id) VALUES (1)", &[]);
    });

    assert!(logs.contains("ERROR"));
    assert!(logs.contains("missing"));
}

#[test]
fn test_trace_target_is_filterable() {
    let ctx = seeded_context();

    let logs = capture_logs(|| {
        ctx.execute_non_query("INSERT INTO items (id) VALUES (7)", &[])
            .expect("insert");
    });

    assert!(logs.contains(sqldal::STATEMENT_TARGET));
}
