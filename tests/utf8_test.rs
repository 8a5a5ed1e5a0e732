//! Integration tests for value fidelity across the driver boundary.
//!
//! Non-ASCII text, blobs, reals and NULLs have to come back from SQLite
//! exactly as they were bound, with their types intact.

use sqldal::provider::sqlite::SqliteProvider;
use sqldal::{ExecutionContext, Parameter, SqlValue};

fn memory_context() -> ExecutionContext {
    let ctx =
        ExecutionContext::connect(&SqliteProvider::in_memory()).expect("open in-memory db");
    ctx.execute_non_query(
        "CREATE TABLE payloads (id INTEGER PRIMARY KEY, label TEXT, body BLOB, score REAL)",
        &[],
    )
    .expect("create table");
    ctx
}

#[test]
fn test_utf8_text_binds_and_reads_back() {
    let ctx = memory_context();
    let labels = ["こんにちは世界", "ثقب أسود", "Grüße", "नमस्ते"];

    for (id, label) in labels.iter().enumerate() {
        ctx.execute_non_query(
            "INSERT INTO payloads (id, label) VALUES (:id, :label)",
            &[
                Parameter::input("id", id as i64),
                Parameter::input("label", *label),
            ],
        )
        .expect("insert");
    }

    let mut read_back = Vec::new();
    ctx.execute_select("SELECT label FROM payloads ORDER BY id", &[], |row| {
        read_back.push(row["label"].as_text().unwrap().to_string());
    })
    .expect("select");
    assert_eq!(read_back, labels);

    // Matching against a non-ASCII parameter value hits the same row.
    let id = ctx
        .field_value(
            "id",
            "SELECT id FROM payloads WHERE label = :label",
            &[Parameter::input("label", "Grüße")],
        )
        .expect("lookup");
    assert_eq!(id.as_integer(), Some(2));
}

#[test]
fn test_blob_real_and_null_keep_their_types() {
    let ctx = memory_context();
    let body: Vec<u8> = vec![0x00, 0xFF, 0x10, 0x7F, 0x80];

    ctx.execute_non_query(
        "INSERT INTO payloads (id, label, body, score) VALUES (:id, :label, :body, :score)",
        &[
            Parameter::input("id", 1),
            Parameter::input("label", SqlValue::Null),
            Parameter::input("body", body.clone()),
            Parameter::input("score", 2.5),
        ],
    )
    .expect("insert");

    let table = ctx
        .execute_select_to_table("SELECT label, body, score FROM payloads", &[])
        .expect("select");
    let row = table.first_row().expect("one row");

    assert!(row["label"].is_null());
    assert_eq!(row["body"].as_blob(), Some(body.as_slice()));
    assert_eq!(row["score"].value(), &SqlValue::Real(2.5));
}
