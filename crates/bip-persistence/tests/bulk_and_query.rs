//! Bulk Writer and Query Executor against the in-memory backend.

mod common;

use bip_model::Dataset;
use bip_persistence::{
    PersistenceError, QueryResult, ResultColumn, SqlType, SqlValue, TableColumn, WriteMode,
    WriteOptions, count_rows, execute_query, replace_write, save_dataset,
};
use common::MockDb;
use polars::prelude::*;

fn quantities(rows: usize) -> Dataset {
    let invoices: Vec<String> = (0..rows).map(|i| format!("{}", 536_365 + i)).collect();
    let quantities: Vec<u8> = (0..rows).map(|i| (i % 200) as u8).collect();
    DataFrame::new(vec![
        Column::new("InvoiceNo".into(), invoices),
        Column::new("Quantity".into(), quantities),
    ])
    .unwrap()
    .into()
}

#[tokio::test]
async fn replace_write_creates_table_and_batches() {
    let db = MockDb::new();
    let session = db.session();

    let summary = replace_write(&session, &quantities(2500), "retail")
        .await
        .unwrap();

    assert_eq!(summary.rows_written, 2500);
    assert_eq!(summary.batches, 3);
    assert!(summary.created);

    let table = db.table("retail");
    assert_eq!(table.rows.len(), 2500);
    assert_eq!(table.columns[1].data_type, "smallint");
    assert_eq!(table.value(2, "Quantity"), Some(&SqlValue::Int(2)));
}

#[tokio::test]
async fn replace_drops_existing_rows() {
    let db = MockDb::new();
    let session = db.session();

    replace_write(&session, &quantities(10), "retail").await.unwrap();
    replace_write(&session, &quantities(4), "retail").await.unwrap();

    assert_eq!(db.table("retail").rows.len(), 4);
    assert!(
        db.state()
            .statements
            .iter()
            .any(|s| s == "DROP TABLE \"retail\"")
    );
}

#[tokio::test]
async fn append_adds_to_existing_table() {
    let db = MockDb::new().with_table(
        "retail",
        vec![
            TableColumn::new("InvoiceNo", "text"),
            TableColumn::new("Quantity", "smallint"),
        ],
    );
    let session = db.session();
    let options = WriteOptions::new(WriteMode::Append).with_batch_size(3);

    save_dataset(&session, &quantities(5), "retail", &options)
        .await
        .unwrap();
    let summary = save_dataset(&session, &quantities(5), "retail", &options)
        .await
        .unwrap();

    assert!(!summary.created);
    assert_eq!(summary.batches, 2);
    assert_eq!(db.table("retail").rows.len(), 10);
    assert_eq!(count_rows(&session, "retail").await.unwrap(), 10);
}

#[tokio::test]
async fn fail_mode_refuses_existing_table() {
    let db = MockDb::new().with_table("retail", vec![TableColumn::new("InvoiceNo", "text")]);

    let err = save_dataset(
        &db.session(),
        &quantities(1),
        "retail",
        &WriteOptions::new(WriteMode::Fail),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PersistenceError::Write { .. }));
    assert!(matches!(err.root_cause(), PersistenceError::Schema { .. }));
}

#[tokio::test]
async fn invalid_table_name_rejected() {
    let db = MockDb::new();
    let err = replace_write(&db.session(), &quantities(1), "retail; DROP TABLE x")
        .await
        .unwrap_err();
    assert_eq!(
        err.root_cause().category(),
        bip_persistence::ErrorCategory::Configuration
    );
    assert!(db.state().statements.is_empty());
}

#[tokio::test]
async fn query_materializes_dataset() {
    let db = MockDb::new();
    db.state().canned.push_back(QueryResult {
        columns: vec![
            ResultColumn::new("Country", SqlType::Text),
            ResultColumn::new("revenue", SqlType::DoublePrecision),
        ],
        rows: vec![
            vec![SqlValue::Text("United Kingdom".into()), SqlValue::Float(8_187_806.36)],
            vec![SqlValue::Text("Netherlands".into()), SqlValue::Float(284_661.54)],
        ],
    });

    let dataset = execute_query(&db.session(), "SELECT \"Country\", SUM(\"TotalPrice\") AS revenue FROM retail GROUP BY 1")
        .await
        .unwrap();

    assert_eq!(dataset.height(), 2);
    assert_eq!(dataset.column("Country").unwrap().str().unwrap().get(1), Some("Netherlands"));

    let state = db.state();
    assert_eq!(state.statements.first().map(String::as_str), Some("BEGIN READ ONLY"));
    assert_eq!(state.commits, 1);
}

#[tokio::test]
async fn malformed_query_is_reported() {
    let db = MockDb::new();

    let err = execute_query(&db.session(), "SELEC 1").await.unwrap_err();

    assert!(matches!(err, PersistenceError::Query { .. }));
    assert!(err.to_string().contains("syntax error"));
    assert_eq!(db.state().rollbacks, 1);
}
