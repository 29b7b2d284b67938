//! Append-only store of results produced during a run.
//!
//! Lets a later collector read an earlier one's output. Entries are shared
//! `Arc<ResultSet>` values and a name can be written only once, so no
//! collector can alter a result another collector already produced.

use crate::error::{DiagError, Result};
use crate::models::ResultSet;
use std::collections::HashMap;
use std::sync::Arc;

/// Named results kept for the duration of a run.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: HashMap<String, Arc<ResultSet>>,
    order: Vec<String>,
}

impl ResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result under its own name.
    ///
    /// # Errors
    /// Returns a configuration error if the name is already stored.
    pub fn insert(&mut self, result: ResultSet) -> Result<Arc<ResultSet>> {
        let name = result.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(DiagError::configuration(format!(
                "Result '{}' is already stored for this run",
                name
            )));
        }
        let shared = Arc::new(result);
        self.entries.insert(name.clone(), Arc::clone(&shared));
        self.order.push(name);
        Ok(shared)
    }

    /// Looks up a stored result.
    pub fn get(&self, name: &str) -> Option<Arc<ResultSet>> {
        self.entries.get(name).cloned()
    }

    /// Returns true if a result with this name is stored.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Stored names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
