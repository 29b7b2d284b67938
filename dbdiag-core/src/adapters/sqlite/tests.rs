//! Unit tests for the SQLite live system.
//!
//! These run against in-memory databases and cover:
//! - Column discovery for empty and populated results
//! - Cell decoding across storage classes
//! - Debug output of fetched results
//! - Capability probing
//! - Error classification at the query boundary

use super::SqliteSystem;
use super::source::{SqliteSource, StatementColumn};
use crate::collector::LiveSystem;
use crate::config::{PlatformVersion, PrivilegeLevel};
use crate::error::DiagError;
use crate::models::CellValue;
use crate::schema::SchemaIntrospector;

async fn memory_system() -> SqliteSystem {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, login_name TEXT NOT NULL, score REAL, avatar BLOB)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO users VALUES (1, 'alice', 9.5, x'DEAD'), (2, 'bob', NULL, NULL)")
        .execute(&pool)
        .await
        .unwrap();

    SqliteSystem::from_pool(pool)
}

// =============================================================================
// Column Discovery
// =============================================================================

#[tokio::test]
async fn test_sqlite_empty_result_keeps_columns() {
    let system = memory_system().await;
    let source = system
        .query("SELECT id, login_name, score FROM users WHERE id < 0")
        .await
        .unwrap();

    let rs = SchemaIntrospector::default().snapshot("none", source.as_ref()).unwrap();
    let names: Vec<_> = rs.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "login_name", "score"]);
    assert!(rs.is_empty());
}

// =============================================================================
// Cell Decoding
// =============================================================================

#[tokio::test]
async fn test_sqlite_cell_decoding() {
    let system = memory_system().await;
    let source = system
        .query("SELECT id, login_name, score, avatar FROM users ORDER BY id")
        .await
        .unwrap();
    let rs = SchemaIntrospector::default().snapshot("users", source.as_ref()).unwrap();

    let first = &rs.rows()[0].cells;
    assert_eq!(first[0], CellValue::Integer(1));
    assert_eq!(first[1], CellValue::Text("alice".to_string()));
    assert_eq!(first[2], CellValue::Float(9.5));
    assert_eq!(first[3].render_text().as_deref(), Some("base64:3q0="));

    let second = &rs.rows()[1].cells;
    assert!(second[2].is_null());
    assert!(second[3].is_null());
}

#[tokio::test]
async fn test_sqlite_source_debug_hides_cells() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let rows = sqlx::query("SELECT 'alice' AS login_name UNION ALL SELECT 'bob'")
        .fetch_all(&pool)
        .await
        .unwrap();
    let columns = vec![StatementColumn {
        name: "login_name".to_string(),
        type_name: None,
    }];

    let debug = format!("{:?}", SqliteSource::new(columns, rows));
    assert!(debug.contains("rows: 2"));
    assert!(debug.contains("login_name"));
    assert!(!debug.contains("alice"));
}

#[tokio::test]
async fn test_sqlite_ordering_column_respected() {
    let system = memory_system().await;
    let source = system
        .query(
            "SELECT ROW_NUMBER() OVER (ORDER BY id DESC) AS __row_number, login_name FROM users ORDER BY id",
        )
        .await
        .unwrap();
    let rs = SchemaIntrospector::default().snapshot("users", source.as_ref()).unwrap();

    assert_eq!(rs.columns().len(), 1);
    assert_eq!(rs.rows()[0].cells[0], CellValue::Text("bob".to_string()));
}

// =============================================================================
// Capabilities and Errors
// =============================================================================

#[tokio::test]
async fn test_sqlite_probe_capabilities() {
    let system = memory_system().await;
    let caps = system.probe_capabilities().await.unwrap();

    assert!(caps.platform_version >= PlatformVersion::new(3, 0, 0));
    assert_eq!(caps.privilege_level, PrivilegeLevel::Administrator);
    assert!(system.test_connection().await.is_ok());
}

#[tokio::test]
async fn test_sqlite_bad_query_is_query_error() {
    let system = memory_system().await;
    let err = system.query("SELECT * FROM missing_table").await.err().unwrap();
    assert!(matches!(err, DiagError::QueryExecution { .. }));
    assert!(err.to_string().contains("missing_table"));
}

#[test]
fn test_option_features_split_values() {
    assert_eq!(
        super::option_features("THREADSAFE=1"),
        vec!["THREADSAFE=1".to_string(), "THREADSAFE".to_string()]
    );
    assert_eq!(
        super::option_features("ENABLE_DBSTAT_VTAB"),
        vec!["ENABLE_DBSTAT_VTAB".to_string()]
    );
}

#[tokio::test]
async fn test_sqlite_read_only_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diag.db");
    let target = format!("sqlite://{}?mode=rwc", path.display());
    let writable = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&target)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE t (v TEXT)").execute(&writable).await.unwrap();
    writable.close().await;

    let system = SqliteSystem::connect(&path.display().to_string()).await.unwrap();
    assert!(system.is_read_only());
    assert_eq!(
        system.probe_capabilities().await.unwrap().privilege_level,
        PrivilegeLevel::Monitor
    );

    let err = system.query("INSERT INTO t VALUES ('x')").await;
    assert!(err.is_err());
    system.close().await;
}
