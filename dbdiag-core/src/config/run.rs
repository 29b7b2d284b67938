//! Write-once run configuration.

use super::{CapabilitySnapshot, PlatformVersion};
use crate::redaction::SensitivePattern;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Maximum units a sink accepts in one atomic write.
pub const DEFAULT_MAX_WRITE_UNITS: usize = 4000;

/// Token emitted in place of redacted values.
pub const DEFAULT_REDACTION_TOKEN: &str = "[SafeMode]";

/// Where the assembled document goes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Standard output
    #[default]
    Console,
    /// A file, created or truncated at run start
    File(PathBuf),
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Console => write!(f, "<stdout>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Boolean run flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunFlags {
    /// Enables the redaction policy
    pub safe_mode: bool,
    /// Appends the extended structural-definition part
    pub export_extended_section: bool,
}

/// Configuration for one diagnostic run.
///
/// Built once at process start, validated, then shared by reference with
/// every component. Nothing mutates it after `validate`.
///
/// # Example
/// ```rust
/// use dbdiag_core::config::{CapabilitySnapshot, PlatformVersion, PrivilegeLevel, RunConfig};
///
/// let config = RunConfig::new("sqlite://diag.db")
///     .with_safe_mode(true)
///     .with_capabilities(CapabilitySnapshot::new(
///         PlatformVersion::new(3, 45, 1),
///         PrivilegeLevel::Monitor,
///     ));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Which system is introspected (URL or path; credentials masked on output)
    pub target: String,
    /// Output destination
    pub output: OutputTarget,
    /// Behavior switches
    pub flags: RunFlags,
    /// Probed capabilities, after overrides
    pub capabilities: CapabilitySnapshot,
    /// The global gate: below this version the whole run aborts
    pub minimum_platform_version: Option<PlatformVersion>,
    /// Sink limit per atomic write, in characters
    pub max_write_units: usize,
    /// Replacement token for redacted cells
    pub redaction_token: String,
    /// Extra column-name patterns treated as sensitive under SafeMode
    pub sensitive_patterns: Vec<SensitivePattern>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            output: OutputTarget::Console,
            flags: RunFlags::default(),
            capabilities: CapabilitySnapshot::default(),
            minimum_platform_version: None,
            max_write_units: DEFAULT_MAX_WRITE_UNITS,
            redaction_token: DEFAULT_REDACTION_TOKEN.to_string(),
            sensitive_patterns: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Creates a run config for a target with safe defaults.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Validates the run configuration.
    ///
    /// # Errors
    /// Returns error if the target is empty, the write limit is zero, or the
    /// redaction token is empty or contains a line break.
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.trim().is_empty() {
            return Err(crate::error::DiagError::configuration(
                "Target identity cannot be empty",
            ));
        }

        if self.max_write_units == 0 {
            return Err(crate::error::DiagError::configuration(
                "max_write_units must be greater than 0",
            ));
        }

        if self.redaction_token.is_empty() || self.redaction_token.contains(['\r', '\n']) {
            return Err(crate::error::DiagError::configuration(
                "Redaction token must be a non-empty single line",
            ));
        }

        for pattern in &self.sensitive_patterns {
            regex::Regex::new(&pattern.pattern).map_err(|e| {
                crate::error::DiagError::configuration(format!(
                    "Invalid sensitive pattern '{}': {}",
                    pattern.pattern, e
                ))
            })?;
        }

        Ok(())
    }

    /// Builder method to set the output destination.
    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    /// Builder method to enable/disable SafeMode.
    pub fn with_safe_mode(mut self, enabled: bool) -> Self {
        self.flags.safe_mode = enabled;
        self
    }

    /// Builder method to enable/disable the extended export part.
    pub fn with_extended_export(mut self, enabled: bool) -> Self {
        self.flags.export_extended_section = enabled;
        self
    }

    /// Builder method to set the capability snapshot.
    pub fn with_capabilities(mut self, capabilities: CapabilitySnapshot) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Builder method to set the global minimum platform version.
    pub fn with_minimum_version(mut self, version: PlatformVersion) -> Self {
        self.minimum_platform_version = Some(version);
        self
    }

    /// Builder method to set the sink write limit.
    pub fn with_max_write_units(mut self, units: usize) -> Self {
        self.max_write_units = units;
        self
    }

    /// Builder method to set the redaction token.
    pub fn with_redaction_token(mut self, token: impl Into<String>) -> Self {
        self.redaction_token = token.into();
        self
    }

    /// Registers an additional sensitive column-name pattern.
    pub fn add_sensitive_pattern(mut self, pattern: SensitivePattern) -> Self {
        self.sensitive_patterns.push(pattern);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_default() {
        let config = RunConfig::default();
        assert_eq!(config.output, OutputTarget::Console);
        assert!(!config.flags.safe_mode);
        assert!(!config.flags.export_extended_section);
        assert_eq!(config.max_write_units, 4000);
        assert_eq!(config.redaction_token, "[SafeMode]");
        assert!(config.minimum_platform_version.is_none());
    }

    #[test]
    fn test_run_config_validation() {
        assert!(RunConfig::new("diag.db").validate().is_ok());
        assert!(RunConfig::new("   ").validate().is_err());
        assert!(
            RunConfig::new("diag.db")
                .with_max_write_units(0)
                .validate()
                .is_err()
        );
        assert!(
            RunConfig::new("diag.db")
                .with_redaction_token("a\nb")
                .validate()
                .is_err()
        );
        assert!(
            RunConfig::new("diag.db")
                .add_sensitive_pattern(SensitivePattern::new("(unclosed", "broken"))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new("diag.db")
            .with_output(OutputTarget::File(PathBuf::from("report.md")))
            .with_safe_mode(true)
            .with_extended_export(true)
            .with_minimum_version(PlatformVersion::new(3, 8, 0))
            .with_max_write_units(100)
            .add_sensitive_pattern(SensitivePattern::new(r"(?i)tenant", "Tenant id"));

        assert!(config.flags.safe_mode);
        assert!(config.flags.export_extended_section);
        assert_eq!(config.max_write_units, 100);
        assert_eq!(config.sensitive_patterns.len(), 1);
        assert_eq!(config.output.to_string(), "report.md");
    }
}
