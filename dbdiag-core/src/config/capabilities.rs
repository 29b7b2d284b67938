//! Capability snapshot of the live system.
//!
//! Resolved once at process start and passed to every gate evaluation;
//! collectors never re-probe.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Platform version as `major.minor.patch`.
///
/// Parsing accepts one to four dot-separated numeric components
/// (`"15"`, `"3.45.1"`, `"16.0.1000.6"`); anything past the third is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformVersion {
    /// Major release
    pub major: u32,
    /// Minor release
    pub minor: u32,
    /// Patch level
    pub patch: u32,
}

impl PlatformVersion {
    /// Creates a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Creates a major-only version (`15` means `15.0.0`).
    pub const fn major(major: u32) -> Self {
        Self::new(major, 0, 0)
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for PlatformVersion {
    type Err = crate::error::DiagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            crate::error::DiagError::configuration(format!("Invalid platform version '{}'", s))
        };

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid());
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }
        // A fourth component must still be numeric
        if let Some(build) = parts.get(3) {
            build.parse::<u32>().map_err(|_| invalid())?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

/// Privilege level of the session used for collection.
///
/// Ordered: a gate requiring `Monitor` passes for `Monitor` and
/// `Administrator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum PrivilegeLevel {
    /// Can read only objects it owns or was granted
    #[default]
    Restricted,
    /// Can read server-wide state views
    Monitor,
    /// Full administrative visibility
    Administrator,
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restricted => write!(f, "restricted"),
            Self::Monitor => write!(f, "monitor"),
            Self::Administrator => write!(f, "administrator"),
        }
    }
}

impl FromStr for PrivilegeLevel {
    type Err = crate::error::DiagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "restricted" => Ok(Self::Restricted),
            "monitor" => Ok(Self::Monitor),
            "administrator" | "admin" => Ok(Self::Administrator),
            other => Err(crate::error::DiagError::configuration(format!(
                "Unknown privilege level '{}'",
                other
            ))),
        }
    }
}

/// Capabilities of the live system, frozen for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// Reported engine version
    pub platform_version: PlatformVersion,
    /// Privilege class of the connected login
    pub privilege_level: PrivilegeLevel,
    /// Optional-feature names, stored upper-case
    features: BTreeSet<String>,
}

impl CapabilitySnapshot {
    /// Creates a snapshot with no optional features.
    pub const fn new(platform_version: PlatformVersion, privilege_level: PrivilegeLevel) -> Self {
        Self {
            platform_version,
            privilege_level,
            features: BTreeSet::new(),
        }
    }

    /// Builder method to add an optional feature flag.
    pub fn with_feature(mut self, feature: impl AsRef<str>) -> Self {
        self.features.insert(feature.as_ref().trim().to_uppercase());
        self
    }

    /// Builder method to add several feature flags.
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for feature in features {
            self = self.with_feature(feature);
        }
        self
    }

    /// Checks a feature flag, case-insensitively.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(&feature.trim().to_uppercase())
    }

    /// Feature flags in sorted order.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }
}

impl Default for CapabilitySnapshot {
    fn default() -> Self {
        Self::new(PlatformVersion::default(), PrivilegeLevel::default())
    }
}

impl Default for PlatformVersion {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}
