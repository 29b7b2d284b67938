//! Live system adapters.
//!
//! An adapter implements [`LiveSystem`] for one platform: it owns the
//! connection, probes capabilities once, and turns read-only queries into
//! [`TabularSource`](crate::schema::TabularSource) handles. Nothing above this
//! module knows a platform's introspection dialect.
//!
//! # Module Structure
//! - `sqlite`: read-only SQLite adapter (feature `sqlite`)

use crate::Result;
use crate::collector::LiveSystem;
use crate::error::{DiagError, redact_target_url};

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSystem;

/// Platforms a target string can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// SQLite database file
    Sqlite,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "SQLite"),
        }
    }
}

/// Detects the platform from a target URL or path.
///
/// # Errors
/// Returns a configuration error for unsupported schemes.
pub fn detect_platform(target: &str) -> Result<Platform> {
    let lower = target.to_lowercase();
    if lower.starts_with("sqlite:")
        || lower == ":memory:"
        || [".db", ".sqlite", ".sqlite3"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    {
        return Ok(Platform::Sqlite);
    }

    Err(DiagError::configuration(format!(
        "Unsupported target '{}': expected a sqlite:// URL or a database file path",
        redact_target_url(target)
    )))
}

/// Opens a read-only live system for a target.
///
/// # Errors
/// Returns a configuration error for unsupported targets or disabled
/// features, or a connection error if the target cannot be opened.
pub async fn connect(target: &str) -> Result<Box<dyn LiveSystem>> {
    match detect_platform(target)? {
        Platform::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                let system = SqliteSystem::connect(target).await?;
                Ok(Box::new(system))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                Err(DiagError::configuration(
                    "SQLite support not compiled in. Enable the 'sqlite' feature.",
                ))
            }
        }
    }
}
