//! Library side of dbdiag-collect.
//!
//! The binary in `main.rs` only parses arguments and dispatches; everything
//! it calls lives here so it can be tested.
//!
//! # Module Structure
//! - `cli`: clap argument definitions
//! - `catalog`: built-in SQLite collector plan
//! - `output`: report sink selection
//! - `report`: report, connection test and listing commands

pub mod catalog;
pub mod cli;
pub mod output;
pub mod report;

pub use cli::{Cli, Command, ReportArgs};
