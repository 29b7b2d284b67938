//! Report, connection test and catalog listing commands.

use crate::catalog;
use crate::cli::ReportArgs;
use crate::output;
use dbdiag_core::adapters;
use dbdiag_core::error::redact_target_url;
use dbdiag_core::{
    CapabilitySnapshot, DiagError, LineSafeWriter, PlatformVersion, ReportAssembler, ReportPlan,
    Result, RunConfig, RunSummary, SensitivePattern,
};
use tracing::{error, info};

/// Environment variable consulted when no target is given.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Picks the target from the command line, falling back to `DATABASE_URL`.
///
/// # Errors
/// Returns a configuration error when no target is available.
pub fn resolve_target(explicit: Option<&str>) -> Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(DATABASE_URL_ENV).ok())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            DiagError::configuration(
                "A target is required (--target, DBDIAG_TARGET or DATABASE_URL)",
            )
        })
}

/// Applies command-line overrides to a probed capability snapshot.
pub fn apply_overrides(
    probed: CapabilitySnapshot,
    assume_version: Option<PlatformVersion>,
    features: &[String],
) -> CapabilitySnapshot {
    let mut snapshot = probed.with_features(features);
    if let Some(version) = assume_version {
        info!(
            "Assuming platform version {} (probed {})",
            version, snapshot.platform_version
        );
        snapshot.platform_version = version;
    }
    snapshot
}

/// Builds the frozen run configuration.
///
/// # Errors
/// Returns a configuration error when the result does not validate.
pub fn build_config(args: &ReportArgs, target: String, capabilities: CapabilitySnapshot) -> Result<RunConfig> {
    let config = args
        .redact_patterns
        .iter()
        .fold(RunConfig::new(target), |config, pattern| {
            config.add_sensitive_pattern(SensitivePattern::new(pattern.clone(), "command line"))
        })
        .with_output(output::output_target(args.output.as_deref(), args.compress))
        .with_safe_mode(args.safe_mode)
        .with_extended_export(args.export_extended)
        .with_minimum_version(args.min_version)
        .with_max_write_units(args.max_write)
        .with_capabilities(capabilities);

    config.validate()?;
    Ok(config)
}

/// Runs the report for the built-in catalog.
///
/// # Errors
/// Returns fatal errors only: connection, configuration, the global version
/// gate, or sink failures. Collector failures end up in the report.
pub async fn run_report(args: &ReportArgs) -> Result<RunSummary> {
    let target = resolve_target(args.target.target.as_deref())?;
    info!("Starting diagnostic report...");
    info!("Target: {}", redact_target_url(&target));

    let system = adapters::connect(&target).await.map_err(|e| {
        error!("Failed to open target: {}", e);
        e
    })?;
    system.test_connection().await?;

    let probed = system.probe_capabilities().await?;
    let capabilities = apply_overrides(probed, args.assume_version, &args.features);
    if args.dump_capabilities {
        let json = serde_json::to_string_pretty(&capabilities).map_err(|e| DiagError::Serialization {
            context: "capability snapshot".to_string(),
            source: e,
        })?;
        eprintln!("{}", json);
    }

    let config = build_config(args, target, capabilities)?;
    info!("Output: {}", config.output);

    let plan = catalog::sqlite_plan()?;
    let assembler = ReportAssembler::new(&config, system.as_ref())?;
    assembler.check_global_precondition()?;

    let sink = output::open_sink(&config.output, args.compress, args.console_fallback)?;
    let mut writer = LineSafeWriter::new(sink, config.max_write_units)?;
    let summary = assembler.run(&plan, &mut writer).await?;

    info!(
        "✓ Report completed: {} populated, {} empty, {} skipped, {} failed",
        summary.populated(),
        summary.empty(),
        summary.skipped(),
        summary.failed()
    );
    Ok(summary)
}

/// Opens the target and runs the connectivity checks.
///
/// # Errors
/// Returns the connection or privilege error that stopped the check.
pub async fn test_connection(target: Option<&str>) -> Result<CapabilitySnapshot> {
    let target = resolve_target(target)?;
    info!("Testing connection to {}...", redact_target_url(&target));

    let system = adapters::connect(&target).await?;
    system.test_connection().await.map_err(|e| {
        error!("Connection test failed: {}", e);
        e
    })?;
    let capabilities = system.probe_capabilities().await?;

    info!("✓ Connection test successful");
    Ok(capabilities)
}

/// Catalog listing, one line per descriptor with its precondition.
pub fn list_catalog(plan: &ReportPlan) -> Vec<String> {
    let mut lines = vec!["Core sections:".to_string()];
    let describe = |index: usize, descriptor: &dbdiag_core::CollectorDescriptor| {
        format!(
            "  {:>2}. {:<20} {} [{}]",
            index,
            descriptor.name(),
            descriptor.title(),
            descriptor.precondition()
        )
    };

    let mut index = 0usize;
    for descriptor in plan.core() {
        index = index.saturating_add(1);
        lines.push(describe(index, descriptor));
    }
    lines.push(String::new());
    lines.push("Extended sections (--export-extended):".to_string());
    for descriptor in plan.extended() {
        index = index.saturating_add(1);
        lines.push(describe(index, descriptor));
    }
    lines
}

/// Prints the catalog to stdout.
///
/// # Errors
/// Returns a configuration error if the catalog is invalid.
pub fn print_catalog() -> Result<()> {
    for line in list_catalog(&catalog::sqlite_plan()?) {
        println!("{}", line);
    }
    println!();
    println!("Targets:");
    println!("  sqlite:///path/to/database.db");
    println!("  /path/to/database.sqlite");
    println!("  Minimum version: {}", catalog::DEFAULT_MINIMUM_VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use dbdiag_core::PrivilegeLevel;

    fn args(extra: &[&str]) -> ReportArgs {
        let argv = ["dbdiag-collect", "--target", "app.db"].iter().chain(extra);
        crate::cli::Cli::try_parse_from(argv).unwrap().report
    }

    #[test]
    fn test_explicit_target_wins() {
        assert_eq!(resolve_target(Some(" app.db ")).unwrap(), "app.db");
    }

    #[test]
    fn test_overrides() {
        let probed = CapabilitySnapshot::new(PlatformVersion::new(3, 45, 1), PrivilegeLevel::Monitor);
        let snapshot = apply_overrides(
            probed,
            Some(PlatformVersion::new(3, 30, 0)),
            &["ENABLE_DBSTAT_VTAB".to_string()],
        );

        assert_eq!(snapshot.platform_version, PlatformVersion::new(3, 30, 0));
        assert!(snapshot.has_feature("ENABLE_DBSTAT_VTAB"));
        assert_eq!(snapshot.privilege_level, PrivilegeLevel::Monitor);
    }

    #[test]
    fn test_build_config() {
        let config = build_config(
            &args(&["--safe-mode", "--redact-pattern", "^tenant", "--max-write", "100"]),
            "app.db".to_string(),
            CapabilitySnapshot::default(),
        )
        .unwrap();

        assert!(config.flags.safe_mode);
        assert!(!config.flags.export_extended_section);
        assert_eq!(config.max_write_units, 100);
        assert_eq!(config.sensitive_patterns.len(), 1);
        assert_eq!(config.minimum_platform_version, Some(catalog::DEFAULT_MINIMUM_VERSION));
    }

    #[test]
    fn test_build_config_rejects_bad_pattern() {
        let result = build_config(
            &args(&["--redact-pattern", "(unclosed"]),
            "app.db".to_string(),
            CapabilitySnapshot::default(),
        );
        assert!(matches!(result, Err(DiagError::Configuration { .. })));
    }

    #[test]
    fn test_build_config_rejects_zero_limit() {
        let result = build_config(
            &args(&["--max-write", "0"]),
            "app.db".to_string(),
            CapabilitySnapshot::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_list_catalog() {
        let lines = list_catalog(&catalog::sqlite_plan().unwrap());
        assert!(lines[1].contains("server_version"));
        assert!(lines.iter().any(|l| l.contains("page_statistics") && l.contains("ENABLE_DBSTAT_VTAB")));
        assert!(lines.last().unwrap().contains("object_definitions"));
    }
}
