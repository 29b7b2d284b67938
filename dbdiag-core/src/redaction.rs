//! SafeMode redaction.
//!
//! Redaction is driven only by column names. A column that matches a
//! registered pattern is replaced wholesale by the redaction token for every
//! row, whichever collector produced it. There is no per-collector special
//! casing and no partial masking of a value.
//!
//! The policy is applied at render time, so the same `ResultSet` can be
//! rendered under different flags without being collected again.

use crate::config::{DEFAULT_REDACTION_TOKEN, RunConfig, RunFlags};
use crate::error::{DiagError, Result};
use crate::models::CellValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Pattern for detecting sensitive columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivePattern {
    /// Regex pattern matched against the lower-cased column name
    pub pattern: String,
    /// Human-readable description of what the pattern protects
    pub description: String,
}

impl SensitivePattern {
    /// Creates a new sensitive pattern.
    pub fn new(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
        }
    }
}

/// Built-in patterns registered in every policy.
pub fn default_patterns() -> Vec<SensitivePattern> {
    vec![
        SensitivePattern::new(
            r"(host|server_?name|machine_?name|computer_?name|client_net_address|ip_address)",
            "Hostname or network address",
        ),
        SensitivePattern::new(
            r"(login|user_?name|^user$|owner|principal)",
            "Login or user name",
        ),
        SensitivePattern::new(
            r"(path|^file$|file_?name|physical_name|directory|folder)",
            "File system path",
        ),
        SensitivePattern::new(
            r"(connection_?string|conn_str|dsn|data_source)",
            "Connection string",
        ),
        SensitivePattern::new(
            r"(credential|password|passwd|pwd|secret|api_?key|token)",
            "Credential identity",
        ),
        SensitivePattern::new(
            r"(query_?text|sql_?text|statement_?text|command|^sql$|definition|batch_text|input_buffer)",
            "Command or query body",
        ),
    ]
}

#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    description: String,
}

fn compile(pattern: &SensitivePattern) -> Result<CompiledRule> {
    let regex = Regex::new(&pattern.pattern).map_err(|e| {
        DiagError::configuration(format!(
            "Invalid sensitive pattern '{}': {}",
            pattern.pattern, e
        ))
    })?;
    Ok(CompiledRule {
        regex,
        description: pattern.description.clone(),
    })
}

/// Default rules compiled once per process.
fn default_rules() -> &'static [CompiledRule] {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        default_patterns()
            .iter()
            .filter_map(|p| compile(p).ok())
            .collect()
    })
}

/// Column-name driven masking policy.
#[derive(Debug, Clone)]
pub struct RedactionPolicy {
    rules: Vec<CompiledRule>,
    token: String,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            rules: default_rules().to_vec(),
            token: DEFAULT_REDACTION_TOKEN.to_string(),
        }
    }
}

impl RedactionPolicy {
    /// Creates a policy with the built-in rules plus `extra` patterns.
    ///
    /// # Errors
    /// Returns a configuration error if any extra pattern is not a valid regex.
    pub fn new(extra: &[SensitivePattern], token: impl Into<String>) -> Result<Self> {
        let mut rules = default_rules().to_vec();
        for pattern in extra {
            rules.push(compile(pattern)?);
        }
        Ok(Self {
            rules,
            token: token.into(),
        })
    }

    /// Creates the policy described by a run configuration.
    ///
    /// # Errors
    /// Returns a configuration error for invalid patterns.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        Self::new(&config.sensitive_patterns, config.redaction_token.clone())
    }

    /// The fixed replacement token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the description of the first rule matching a column, if any.
    pub fn matching_rule(&self, column: &str) -> Option<&str> {
        let lower = column.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(&lower))
            .map(|rule| rule.description.as_str())
    }

    /// Checks whether a column name is registered as sensitive.
    pub fn is_sensitive(&self, column: &str) -> bool {
        self.matching_rule(column).is_some()
    }

    /// Returns the value that may be emitted for a cell.
    ///
    /// Pass-through unless SafeMode is on and the column is sensitive, in
    /// which case the whole cell becomes the token, nulls included.
    pub fn mask<'a>(&self, column: &str, raw: &'a CellValue, flags: &RunFlags) -> Cow<'a, CellValue> {
        if flags.safe_mode && self.is_sensitive(column) {
            Cow::Owned(CellValue::Text(self.token.clone()))
        } else {
            Cow::Borrowed(raw)
        }
    }

    /// Text form of a masked cell; `None` for an unmasked null.
    pub fn mask_text(&self, column: &str, raw: &CellValue, flags: &RunFlags) -> Option<String> {
        let masked = self.mask(column, raw, flags);
        masked.render_text().map(Cow::into_owned)
    }
}
