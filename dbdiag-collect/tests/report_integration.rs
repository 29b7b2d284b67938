//! End-to-end runs of the built-in catalog against SQLite files.
//!
//! This test suite covers:
//! - A full report written to a file
//! - SafeMode masking of file paths in the report
//! - Connection checks never creating missing databases
//! - Console fallback for unwritable output paths
//! - No output file when the global minimum version aborts the run

#![cfg(feature = "sqlite")]
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use clap::Parser;
use dbdiag_collect::{Cli, report};
use dbdiag_core::{DiagError, SectionStatus};
use std::path::Path;

async fn create_database(path: &Path) {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .unwrap();

    for statement in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, email TEXT)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(id))",
        "CREATE INDEX idx_orders_customer ON orders(customer_id)",
        "CREATE VIEW order_count AS SELECT customer_id, COUNT(*) AS n FROM orders GROUP BY customer_id",
    ] {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

fn report_args(db: &Path, out: &Path, extra: &[&str]) -> dbdiag_collect::ReportArgs {
    let db = db.display().to_string();
    let out = out.display().to_string();
    let mut argv = vec!["dbdiag-collect", "report", "--target", &db, "--output", &out];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).unwrap().command {
        Some(dbdiag_collect::Command::Report(args)) => args,
        other => panic!("Expected report command, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sqlite_report_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("shop.db");
    let out = dir.path().join("report.md");
    create_database(&db).await;

    let summary = report::run_report(&report_args(&db, &out, &[])).await.unwrap();
    let doc = std::fs::read_to_string(&out).unwrap();

    assert_eq!(
        summary.status_of("server_version"),
        Some(&SectionStatus::Populated { rows: 1 })
    );
    assert!(summary.status_of("object_counts").is_some());
    assert!(summary.status_of("object_definitions").is_none());
    assert!(doc.contains("## 1. Server version"));
    assert!(doc.contains("# Run summary"));
    assert!(!doc.contains("# Extended definitions"));
    assert_eq!(summary.sections.len(), 9);
}

#[tokio::test]
async fn test_sqlite_extended_report_includes_definitions() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("shop.db");
    let out = dir.path().join("report.md");
    create_database(&db).await;

    let summary = report::run_report(&report_args(&db, &out, &["--export-extended"]))
        .await
        .unwrap();
    let doc = std::fs::read_to_string(&out).unwrap();

    assert_eq!(
        summary.status_of("object_definitions"),
        Some(&SectionStatus::Populated { rows: 4 })
    );
    assert!(doc.contains("**view.order_count**"));
    assert!(doc.contains("CREATE INDEX idx_orders_customer"));
}

#[tokio::test]
async fn test_sqlite_safe_mode_masks_file_paths() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("shop.db");
    let out = dir.path().join("report.md");
    create_database(&db).await;

    report::run_report(&report_args(&db, &out, &["--safe-mode", "--export-extended"]))
        .await
        .unwrap();
    let doc = std::fs::read_to_string(&out).unwrap();

    assert!(!doc.contains(&db.display().to_string()));
    assert!(!doc.contains("CREATE TABLE customers"));
    assert!(doc.contains("[SafeMode]"));
}

#[tokio::test]
async fn test_sqlite_global_minimum_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("shop.db");
    let out = dir.path().join("report.md");
    create_database(&db).await;

    let err = report::run_report(&report_args(&db, &out, &["--min-version", "999.0.0"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("below the required minimum 999.0.0"));
    assert!(!out.exists());

    let unwritable = dir.path().join("no_such_dir").join("report.md");
    let err = report::run_report(&report_args(&db, &unwritable, &["--min-version", "999.0.0"]))
        .await
        .unwrap_err();
    assert!(matches!(err, DiagError::GlobalPrecondition { .. }));
}

#[tokio::test]
async fn test_sqlite_connection_check_does_not_create_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.db");

    let result = report::test_connection(Some(&missing.display().to_string())).await;
    assert!(result.is_err());
    assert!(!missing.exists());
}

#[tokio::test]
async fn test_sqlite_console_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("shop.db");
    let out = dir.path().join("no_such_dir").join("report.md");
    create_database(&db).await;

    assert!(report::run_report(&report_args(&db, &out, &[])).await.is_err());
    assert!(
        report::run_report(&report_args(&db, &out, &["--console-fallback"]))
            .await
            .is_ok()
    );
}
