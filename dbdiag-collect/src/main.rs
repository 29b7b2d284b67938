//! Diagnostic report collector.
//!
//! Connects read-only to a live database, runs the built-in collector
//! catalog and streams one Markdown report to a file or stdout.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - No credentials stored or logged
//! - Optional SafeMode redaction of sensitive columns

use anyhow::Context;
use clap::Parser;
use dbdiag_collect::{Cli, Command, report};
use dbdiag_core::logging::init_logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Some(Command::Test(args)) => {
            let capabilities = report::test_connection(args.target.as_deref())
                .await
                .context("Connection test failed")?;
            println!(
                "Connection successful: version {}, {} privileges",
                capabilities.platform_version, capabilities.privilege_level
            );
        }
        Some(Command::List) => report::print_catalog()?,
        Some(Command::Report(args)) => run(args).await?,
        None => run(&cli.report).await?,
    }

    Ok(())
}

async fn run(args: &dbdiag_collect::ReportArgs) -> anyhow::Result<()> {
    let summary = report::run_report(args)
        .await
        .context("Report run aborted")?;
    tracing::debug!("Run summary: {}", summary.to_json()?);
    Ok(())
}
