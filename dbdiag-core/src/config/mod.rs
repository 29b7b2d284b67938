//! Run configuration types.
//!
//! This module contains the configuration consulted by every component:
//! - `RunConfig`: write-once run configuration (target, output, flags)
//! - `CapabilitySnapshot`: platform version, privilege level and features
//!
//! # Security
//! These structs never store passwords. The target identity is kept as given
//! and must be passed through `redact_target_url` before it is logged.

mod capabilities;
mod run;

pub use capabilities::{CapabilitySnapshot, PlatformVersion, PrivilegeLevel};
pub use run::{DEFAULT_MAX_WRITE_UNITS, DEFAULT_REDACTION_TOKEN, OutputTarget, RunConfig, RunFlags};
