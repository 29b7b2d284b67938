//! SQLite target parsing and pool creation.
//!
//! # Target Formats
//! - `sqlite:///path/to/database.db` or `sqlite://./relative.db`
//! - `sqlite::memory:` or `:memory:`
//! - a bare file path ending in `.db`, `.sqlite` or `.sqlite3`
//!
//! Pools are always opened read-only with a single connection.

use crate::Result;
use crate::error::DiagError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEME: &str = "sqlite:";

/// Validates a SQLite target string.
///
/// # Errors
/// Returns a configuration error if the target is not a SQLite URL, the
/// in-memory shorthand, or a database file path.
pub fn validate_target(target: &str) -> Result<()> {
    let lower = target.to_lowercase();
    if lower == ":memory:" {
        return Ok(());
    }
    if [".db", ".sqlite", ".sqlite3"].iter().any(|ext| lower.ends_with(ext)) {
        return Ok(());
    }
    if let Some(rest) = lower.strip_prefix(SCHEME)
        && !rest.is_empty()
    {
        return Ok(());
    }

    Err(DiagError::configuration(
        "Invalid SQLite target: expected sqlite:// URL, file path, or :memory:",
    ))
}

/// Converts a target into a `sqlite:` URL.
///
/// The scheme is lower-cased; the path keeps its case.
pub fn normalize_target(target: &str) -> String {
    if target.eq_ignore_ascii_case(":memory:") {
        return "sqlite::memory:".to_string();
    }
    match target.get(..SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => {
            format!("{}{}", SCHEME, &target[SCHEME.len()..])
        }
        _ => format!("sqlite://{}", target),
    }
}

/// Opens a read-only, single-connection pool.
///
/// # Errors
/// Returns a configuration error for unparsable targets and a connection
/// error if the database cannot be opened.
pub async fn open_read_only(target: &str) -> Result<SqlitePool> {
    validate_target(target)?;

    let options = SqliteConnectOptions::from_str(&normalize_target(target))
        .map_err(|e| DiagError::configuration(format!("Invalid SQLite target: {}", e)))?
        .read_only(true)
        .create_if_missing(false);

    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(DiagError::connection_failed)
}
