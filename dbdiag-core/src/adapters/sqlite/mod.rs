//! SQLite live system.
//!
//! # Module Structure
//! - `connection`: target parsing and read-only pool creation
//! - `source`: `TabularSource` over query results with lazy cell decoding
//!
//! # Security Guarantees
//! - Databases are opened read-only; a missing file is never created
//! - A single pooled connection, so every query runs in program order
//! - Targets are redacted before they reach logs or errors

pub mod connection;
pub mod source;

#[cfg(test)]
mod tests;

use crate::Result;
use crate::collector::LiveSystem;
use crate::config::{CapabilitySnapshot, PlatformVersion, PrivilegeLevel};
use crate::error::{DiagError, redact_target_url};
use crate::schema::TabularSource;
use async_trait::async_trait;
use source::{SqliteSource, StatementColumn};
use sqlx::{Column, Executor, SqlitePool, Statement, TypeInfo};

/// Feature name registered when the JSON functions are usable.
pub const JSON_FEATURE: &str = "JSON";

/// Read-only SQLite handle.
pub struct SqliteSystem {
    pool: SqlitePool,
    read_only: bool,
    target: String,
}

impl std::fmt::Debug for SqliteSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSystem")
            .field("target", &redact_target_url(&self.target))
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl SqliteSystem {
    /// Opens a target read-only.
    ///
    /// # Errors
    /// Returns a configuration error for invalid targets or a connection
    /// error if the database cannot be opened.
    pub async fn connect(target: &str) -> Result<Self> {
        tracing::debug!("Opening SQLite target {}", redact_target_url(target));
        let pool = connection::open_read_only(target).await?;
        Ok(Self {
            pool,
            read_only: true,
            target: target.to_string(),
        })
    }

    /// Wraps an existing pool (in-memory databases, tests).
    ///
    /// The caller is responsible for the pool's access mode; capabilities
    /// report `Administrator` privilege for it.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            read_only: false,
            target: "sqlite::memory:".to_string(),
        }
    }

    /// Returns true when the underlying connection is read-only.
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn platform_version(&self) -> Result<PlatformVersion> {
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_query_error("SELECT sqlite_version()", &e))?;
        version.parse()
    }

    async fn compile_options(&self) -> Vec<String> {
        match sqlx::query_scalar::<_, String>("PRAGMA compile_options")
            .fetch_all(&self.pool)
            .await
        {
            Ok(options) => options,
            Err(e) => {
                tracing::debug!("compile_options unavailable: {}", e);
                Vec::new()
            }
        }
    }

    async fn has_json(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT json_valid('{}')")
            .fetch_one(&self.pool)
            .await
            .is_ok_and(|v| v == 1)
    }
}

/// Feature names for a compile option: the option itself and, for
/// `NAME=value` options, the bare name.
fn option_features(option: &str) -> Vec<String> {
    let mut features = vec![option.to_string()];
    if let Some((name, _)) = option.split_once('=') {
        features.push(name.to_string());
    }
    features
}

fn map_query_error(sql: &str, error: &sqlx::Error) -> DiagError {
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("not authorized") || lower.contains("readonly") || lower.contains("read-only") {
        return DiagError::insufficient_privileges(message);
    }
    let head: String = sql.split_whitespace().collect::<Vec<_>>().join(" ").chars().take(80).collect();
    DiagError::query_failed(format!("{} ({})", message, head))
}

#[async_trait]
impl LiveSystem for SqliteSystem {
    async fn test_connection(&self) -> Result<()> {
        let connectivity: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(DiagError::connection_failed)?;
        if connectivity != 1 {
            return Err(DiagError::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }

        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DiagError::insufficient_privileges(format!("Cannot access sqlite_master: {}", e))
            })?;

        Ok(())
    }

    async fn probe_capabilities(&self) -> Result<CapabilitySnapshot> {
        let version = self.platform_version().await?;
        let privilege = if self.read_only {
            PrivilegeLevel::Monitor
        } else {
            PrivilegeLevel::Administrator
        };

        let options = self.compile_options().await;
        let mut snapshot = CapabilitySnapshot::new(version, privilege)
            .with_features(options.iter().flat_map(|o| option_features(o)));
        if self.has_json().await {
            snapshot = snapshot.with_feature(JSON_FEATURE);
        }

        tracing::debug!(
            "Probed SQLite {} ({} privileges, {} features)",
            snapshot.platform_version,
            snapshot.privilege_level,
            snapshot.features().count()
        );
        Ok(snapshot)
    }

    async fn query(&self, sql: &str) -> Result<Box<dyn TabularSource + Send + Sync>> {
        let statement = (&self.pool)
            .prepare(sql)
            .await
            .map_err(|e| map_query_error(sql, &e))?;

        let columns = statement
            .columns()
            .iter()
            .map(|c| StatementColumn {
                name: c.name().to_string(),
                type_name: Some(c.type_info().name().to_string())
                    .filter(|t| !t.is_empty() && t != "NULL"),
            })
            .collect();

        let rows = statement
            .query()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_query_error(sql, &e))?;

        Ok(Box::new(SqliteSource::new(columns, rows)))
    }
}
