//! Command-line surface for dbdiag-collect.

use clap::{Args, Parser, Subcommand};
use dbdiag_core::PlatformVersion;
use dbdiag_core::config::DEFAULT_MAX_WRITE_UNITS;
use std::path::PathBuf;

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "dbdiag-collect")]
#[command(about = "Diagnostic report collector")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "
dbdiag Collector - read-only diagnostic reports

Runs an ordered catalog of collectors against a live database and streams
one Markdown report containing:
- Version, files and build options
- Tables, views, indexes and foreign keys
- Page statistics (when the dbstat virtual table is compiled in)
- Object definitions (with --export-extended)

SECURITY FEATURES:
- Read-only connection; a missing database file is never created
- Credentials masked in logs and in the report header
- SafeMode redaction of hosts, logins, file paths and query text

EXAMPLES:
  dbdiag-collect --target sqlite:///var/lib/app/app.db
  dbdiag-collect --safe-mode --output report.md --target /var/lib/app/app.db
  dbdiag-collect test --target ./app.sqlite
")]
pub struct Cli {
    /// Flags accepted by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Report options when no subcommand is given
    #[command(flatten)]
    pub report: ReportArgs,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the diagnostic report (default)
    Report(ReportArgs),
    /// Check that the target can be opened and read
    Test(TargetArgs),
    /// Print the collector catalog with its preconditions
    List,
}

/// Target selection shared by every command that connects
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Target database (falls back to DATABASE_URL)
    #[arg(
        short,
        long,
        env = "DBDIAG_TARGET",
        help = "Target database URL or file path (credentials are masked in logs)"
    )]
    pub target: Option<String>,
}

/// Options for a report run
#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Target selection
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output file path
    #[arg(short, long, help = "Report file path (stdout when omitted)")]
    pub output: Option<PathBuf>,

    /// Enable SafeMode redaction
    #[arg(long, help = "Mask hosts, logins, file paths and query text")]
    pub safe_mode: bool,

    /// Append the extended section
    #[arg(long, help = "Append object definitions after the core sections")]
    pub export_extended: bool,

    /// Global minimum version
    #[arg(
        long,
        default_value = "3.8.0",
        help = "Abort before any collector runs when the server is older"
    )]
    pub min_version: PlatformVersion,

    /// Sink write limit
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_WRITE_UNITS,
        help = "Maximum characters per atomic sink write"
    )]
    pub max_write: usize,

    /// Extra sensitive column patterns
    #[arg(
        long = "redact-pattern",
        value_name = "REGEX",
        help = "Additional column-name regex masked in SafeMode (repeatable)"
    )]
    pub redact_patterns: Vec<String>,

    /// Fall back to stdout
    #[arg(long, help = "Write to stdout if the output file cannot be created")]
    pub console_fallback: bool,

    /// Enable compression
    #[arg(long, help = "Compress the report file using Zstandard (.zst)")]
    pub compress: bool,

    /// Version override
    #[arg(long, value_name = "VERSION", help = "Use this version instead of the probed one")]
    pub assume_version: Option<PlatformVersion>,

    /// Feature overrides
    #[arg(
        long = "feature",
        value_name = "NAME",
        help = "Treat a feature as present (repeatable)"
    )]
    pub features: Vec<String>,

    /// Dump capabilities
    #[arg(long, help = "Print the capability snapshot as JSON to stderr")]
    pub dump_capabilities: bool,
}

/// Flags accepted by every command
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all logs except errors")]
    pub quiet: bool,
}

impl Cli {
    /// Report options for the selected command, if it runs a report.
    pub fn report_args(&self) -> Option<&ReportArgs> {
        match &self.command {
            Some(Command::Report(args)) => Some(args),
            Some(Command::Test(_) | Command::List) => None,
            None => Some(&self.report),
        }
    }
}
