//! Capability gating for collectors.
//!
//! A [`Precondition`] is evaluated against the frozen [`CapabilitySnapshot`]
//! before a collector runs. Evaluation is pure: the same inputs always give
//! the same decision, and a failed gate produces a readable reason for the
//! section's provenance notes rather than an error.

use crate::config::{CapabilitySnapshot, PlatformVersion, PrivilegeLevel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Boolean precondition over the capability snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
    /// Always runs
    Always,
    /// Platform version must be at least this
    MinVersion(PlatformVersion),
    /// Platform version must be strictly below this
    BelowVersion(PlatformVersion),
    /// Session privilege must be at least this
    Privilege(PrivilegeLevel),
    /// Named optional feature must be present
    Feature(String),
    /// Every inner precondition must hold
    All(Vec<Precondition>),
    /// At least one inner precondition must hold
    Any(Vec<Precondition>),
    /// Inner precondition must not hold
    Not(Box<Precondition>),
}

impl Precondition {
    /// Shorthand for a major-version floor.
    pub const fn min_major(major: u32) -> Self {
        Self::MinVersion(PlatformVersion::major(major))
    }

    /// Shorthand for a feature check.
    pub fn feature(name: impl Into<String>) -> Self {
        Self::Feature(name.into())
    }

    /// Conjunction with another precondition, flattening nested `All`.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Always, other) | (other, Self::Always) => other,
            (Self::All(mut left), Self::All(right)) => {
                left.extend(right);
                Self::All(left)
            }
            (Self::All(mut left), other) => {
                left.push(other);
                Self::All(left)
            }
            (this, other) => Self::All(vec![this, other]),
        }
    }

    /// Disjunction with another precondition.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Any(mut left), other) => {
                left.push(other);
                Self::Any(left)
            }
            (this, other) => Self::Any(vec![this, other]),
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Precondition], sep: &str) -> fmt::Result {
            write!(f, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", sep)?;
                }
                write!(f, "{}", item)?;
            }
            write!(f, ")")
        }

        match self {
            Self::Always => write!(f, "always"),
            Self::MinVersion(v) => write!(f, "version >= {}", v),
            Self::BelowVersion(v) => write!(f, "version < {}", v),
            Self::Privilege(p) => write!(f, "privilege >= {}", p),
            Self::Feature(name) => write!(f, "feature {}", name),
            Self::All(items) => join(f, items, "and"),
            Self::Any(items) => join(f, items, "or"),
            Self::Not(inner) => write!(f, "not {}", inner),
        }
    }
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Execute the collector
    Run,
    /// Render a skip placeholder instead
    Skip {
        /// The unmet condition, as shown in the report
        reason: String,
    },
}

impl GateDecision {
    /// Returns true when the collector should run.
    pub const fn should_run(&self) -> bool {
        matches!(self, Self::Run)
    }

    fn skip(reason: String) -> Self {
        Self::Skip { reason }
    }
}

/// Evaluates a precondition against a capability snapshot.
///
/// # Example
/// ```rust
/// use dbdiag_core::config::{CapabilitySnapshot, PlatformVersion, PrivilegeLevel};
/// use dbdiag_core::gate::{GateDecision, Precondition, evaluate};
///
/// let caps = CapabilitySnapshot::new(PlatformVersion::major(12), PrivilegeLevel::Monitor);
/// let decision = evaluate(&Precondition::min_major(15), &caps);
/// assert!(matches!(decision, GateDecision::Skip { .. }));
/// ```
pub fn evaluate(precondition: &Precondition, capabilities: &CapabilitySnapshot) -> GateDecision {
    match precondition {
        Precondition::Always => GateDecision::Run,
        Precondition::MinVersion(required) => {
            if capabilities.platform_version >= *required {
                GateDecision::Run
            } else {
                GateDecision::skip(format!(
                    "requires platform version >= {} (found {})",
                    required, capabilities.platform_version
                ))
            }
        }
        Precondition::BelowVersion(limit) => {
            if capabilities.platform_version < *limit {
                GateDecision::Run
            } else {
                GateDecision::skip(format!(
                    "applies to platform versions below {} (found {})",
                    limit, capabilities.platform_version
                ))
            }
        }
        Precondition::Privilege(required) => {
            if capabilities.privilege_level >= *required {
                GateDecision::Run
            } else {
                GateDecision::skip(format!(
                    "requires {} privileges (session has {})",
                    required, capabilities.privilege_level
                ))
            }
        }
        Precondition::Feature(name) => {
            if capabilities.has_feature(name) {
                GateDecision::Run
            } else {
                GateDecision::skip(format!("requires feature {}", name))
            }
        }
        Precondition::All(items) => items
            .iter()
            .map(|item| evaluate(item, capabilities))
            .find(|decision| !decision.should_run())
            .unwrap_or(GateDecision::Run),
        Precondition::Any(items) => {
            if items.is_empty() {
                return GateDecision::skip("no alternative applies".to_string());
            }
            let mut reasons = Vec::with_capacity(items.len());
            for item in items {
                match evaluate(item, capabilities) {
                    GateDecision::Run => return GateDecision::Run,
                    GateDecision::Skip { reason } => reasons.push(reason),
                }
            }
            GateDecision::skip(reasons.join("; or "))
        }
        Precondition::Not(inner) => match evaluate(inner, capabilities) {
            GateDecision::Run => GateDecision::skip(format!("excluded when {}", inner)),
            GateDecision::Skip { .. } => GateDecision::Run,
        },
    }
}
