//! The report run loop.
//!
//! One pass over the plan in declared order, no retries. Each descriptor
//! moves through `Gate -> {Skipped | Running -> {Succeeded | Failed}} ->
//! Rendered` exactly once, and its section is written as soon as it is
//! rendered. Everything that goes wrong inside a collector or while
//! rendering its result becomes a placeholder section; only the global
//! precondition, configuration errors and sink failures end a run.

use crate::collector::{CollectorContext, CollectorDescriptor, CollectorOutcome, LiveSystem, ReportPlan};
use crate::config::RunConfig;
use crate::error::{DiagError, Result, redact_target_url};
use crate::gate::{self, GateDecision, Precondition};
use crate::models::{CellValue, ResultSet};
use crate::redaction::RedactionPolicy;
use crate::render::{self, RenderMode, TabularRenderer};
use crate::schema::SchemaIntrospector;
use crate::store::ResultStore;
use crate::writer::{LineSafeWriter, LineSink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Why a section failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The live system rejected or broke the request
    Boundary,
    /// The result could not be rendered in the requested shape
    Malformed,
}

impl FailureKind {
    const fn of(error: &DiagError) -> Self {
        match error {
            DiagError::MalformedResult { .. } => Self::Malformed,
            _ => Self::Boundary,
        }
    }
}

/// Final state of one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionStatus {
    /// Result with at least one row
    Populated {
        /// Row count of the stored result
        rows: usize,
    },
    /// Zero-row result, or the collector reported nothing
    Empty {
        /// Why nothing was produced, when known
        reason: Option<String>,
    },
    /// Gate said skip; the collector was never invoked
    Skipped {
        /// Unmet precondition
        reason: String,
    },
    /// Collector or render error, contained to this section
    Failed {
        /// Error class
        kind: FailureKind,
        /// Error text as rendered
        reason: String,
    },
}

impl SectionStatus {
    /// Short lowercase label used in the summary table.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Populated { .. } => "populated",
            Self::Empty { .. } => "empty",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Populated { rows } => format!("{} rows", rows),
            Self::Empty { reason } => reason.clone().unwrap_or_default(),
            Self::Skipped { reason } | Self::Failed { reason, .. } => reason.clone(),
        }
    }
}

/// One rendered section, written once and never revisited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSection {
    /// 1-based position in the document
    pub index: usize,
    /// Descriptor name
    pub name: String,
    /// Section heading
    pub title: String,
    /// Provenance lines shown under the heading
    pub notes: Vec<String>,
    /// Final state
    pub status: SectionStatus,
    /// Rendered body (fenced block or placeholder)
    pub lines: Vec<String>,
}

impl RenderedSection {
    /// All document lines of the section, heading first.
    pub fn document_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("## {}. {}", self.index, render::single_line(&self.title)), String::new()];
        if !self.notes.is_empty() {
            lines.extend(self.notes.iter().map(|n| format!("> {}", render::single_line(n))));
            lines.push(String::new());
        }
        lines.extend(self.lines.iter().cloned());
        lines.push(String::new());
        lines
    }
}

/// Per-section entry of a run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    /// 1-based position in the document
    pub index: usize,
    /// Descriptor name
    pub name: String,
    /// Final state
    pub status: SectionStatus,
}

/// What happened during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Identifier printed in the report header
    pub run_id: Uuid,
    /// When the header was written
    pub started_at: DateTime<Utc>,
    /// When the last section was written
    pub finished_at: DateTime<Utc>,
    /// One entry per executed or skipped descriptor, in document order
    pub sections: Vec<SectionSummary>,
    /// Number of sink writes issued for the document
    pub writes: u64,
}

impl RunSummary {
    fn count(&self, label: &str) -> usize {
        self.sections.iter().filter(|s| s.status.label() == label).count()
    }

    /// Sections with at least one row.
    pub fn populated(&self) -> usize {
        self.count("populated")
    }

    /// Sections without rows.
    pub fn empty(&self) -> usize {
        self.count("empty")
    }

    /// Sections whose gate said skip.
    pub fn skipped(&self) -> usize {
        self.count("skipped")
    }

    /// Sections that failed.
    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    /// Section status by collector name.
    pub fn status_of(&self, name: &str) -> Option<&SectionStatus> {
        self.sections.iter().find(|s| s.name == name).map(|s| &s.status)
    }

    /// Serializes the summary as pretty JSON.
    ///
    /// # Errors
    /// Returns `DiagError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiagError::Serialization {
            context: "Failed to serialize run summary".to_string(),
            source: e,
        })
    }
}

/// Drives a full run against one live system.
pub struct ReportAssembler<'a> {
    config: &'a RunConfig,
    system: &'a dyn LiveSystem,
    policy: RedactionPolicy,
    introspector: SchemaIntrospector,
}

impl std::fmt::Debug for ReportAssembler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportAssembler")
            .field("target", &redact_target_url(&self.config.target))
            .field("introspector", &self.introspector)
            .finish_non_exhaustive()
    }
}

impl<'a> ReportAssembler<'a> {
    /// Creates an assembler for a validated configuration.
    ///
    /// # Errors
    /// Returns a configuration error if the config or its patterns are invalid.
    pub fn new(config: &'a RunConfig, system: &'a dyn LiveSystem) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            system,
            policy: RedactionPolicy::from_config(config)?,
            introspector: SchemaIntrospector::default(),
        })
    }

    /// Replaces the schema introspector (e.g. a different ordering column).
    pub fn with_introspector(mut self, introspector: SchemaIntrospector) -> Self {
        self.introspector = introspector;
        self
    }

    /// Redaction policy built from the run configuration.
    pub const fn policy(&self) -> &RedactionPolicy {
        &self.policy
    }

    /// Checks the run-wide minimum platform version.
    ///
    /// # Errors
    /// Returns `DiagError::GlobalPrecondition` when the platform is too old.
    pub fn check_global_precondition(&self) -> Result<()> {
        let Some(required) = self.config.minimum_platform_version else {
            return Ok(());
        };
        let found = self.config.capabilities.platform_version;
        match gate::evaluate(&Precondition::MinVersion(required), &self.config.capabilities) {
            GateDecision::Run => Ok(()),
            GateDecision::Skip { .. } => Err(DiagError::GlobalPrecondition {
                required: required.to_string(),
                found: found.to_string(),
            }),
        }
    }

    /// Runs the plan and streams the document into `writer`.
    ///
    /// The extended part runs only when `export_extended_section` is set.
    ///
    /// # Errors
    /// Returns `GlobalPrecondition` before anything is written, or `Sink`
    /// if the document cannot be written. Collector problems never surface
    /// here.
    pub async fn run<S: LineSink>(&self, plan: &ReportPlan, writer: &mut LineSafeWriter<S>) -> Result<RunSummary> {
        self.check_global_precondition()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let extended = self.config.flags.export_extended_section;
        let planned = if extended { plan.len() } else { plan.core().len() };
        tracing::info!("Starting diagnostic run {} with {} collectors", run_id, planned);

        writer.write_lines(self.header_lines(run_id, started_at))?;

        let mut store = ResultStore::new();
        let mut sections = Vec::with_capacity(planned);
        let mut index = 0usize;

        let parts: [(Option<&str>, &[CollectorDescriptor]); 2] = [
            (None, plan.core()),
            (Some("Extended definitions"), if extended { plan.extended() } else { &[] }),
        ];

        for (heading, descriptors) in parts {
            if descriptors.is_empty() {
                continue;
            }
            if let Some(heading) = heading {
                writer.write_lines([format!("# {}", heading), String::new()])?;
            }
            for descriptor in descriptors {
                index = index.saturating_add(1);
                let section = self.run_descriptor(index, descriptor, &mut store).await;
                writer.write_lines(section.document_lines())?;
                sections.push(SectionSummary {
                    index: section.index,
                    name: section.name,
                    status: section.status,
                });
            }
        }

        let mut summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            sections,
            writes: 0,
        };
        writer.write_lines(self.footer_lines(&summary))?;
        writer.finish()?;
        summary.writes = writer.writes();

        tracing::info!(
            "Run {} complete: {} populated, {} empty, {} skipped, {} failed",
            run_id,
            summary.populated(),
            summary.empty(),
            summary.skipped(),
            summary.failed()
        );

        Ok(summary)
    }

    /// Gates, executes and renders one descriptor.
    async fn run_descriptor(&self, index: usize, descriptor: &CollectorDescriptor, store: &mut ResultStore) -> RenderedSection {
        let mut notes = descriptor.notes().to_vec();
        if descriptor.precondition() != &Precondition::Always {
            notes.push(format!("Requires: {}", descriptor.precondition()));
        }

        let (status, lines) = match gate::evaluate(descriptor.precondition(), &self.config.capabilities) {
            GateDecision::Skip { reason } => {
                tracing::debug!("Skipping '{}': {}", descriptor.name(), reason);
                let line = render::skipped(&reason);
                (SectionStatus::Skipped { reason }, vec![line])
            }
            GateDecision::Run => {
                tracing::debug!("Running collector '{}'", descriptor.name());
                let outcome = {
                    let ctx = CollectorContext {
                        name: descriptor.name(),
                        system: self.system,
                        config: self.config,
                        store: &*store,
                        introspector: &self.introspector,
                    };
                    descriptor.collector().execute(&ctx).await
                };
                self.settle(descriptor, outcome, store)
            }
        };

        RenderedSection {
            index,
            name: descriptor.name().to_string(),
            title: descriptor.title().to_string(),
            notes,
            status,
            lines,
        }
    }

    /// Renders an outcome and stores a produced result.
    fn settle(&self, descriptor: &CollectorDescriptor, outcome: CollectorOutcome, store: &mut ResultStore) -> (SectionStatus, Vec<String>) {
        match outcome {
            CollectorOutcome::Produced(result) => {
                let result = if result.name() == descriptor.name() {
                    result
                } else {
                    result.renamed(descriptor.name())
                };
                let rendered = self.render_result(&result, descriptor.render());
                let rows = result.row_count();
                if let Err(e) = store.insert(result) {
                    tracing::warn!("Result of '{}' not stored: {}", descriptor.name(), e);
                }

                match rendered {
                    Ok(lines) if rows == 0 => (SectionStatus::Empty { reason: None }, lines),
                    Ok(lines) => (SectionStatus::Populated { rows }, lines),
                    Err(e) => self.failed(descriptor, &e),
                }
            }
            CollectorOutcome::Absent(reason) => {
                tracing::debug!("Collector '{}' returned no result", descriptor.name());
                let lines = render::no_results(reason.as_deref());
                (SectionStatus::Empty { reason }, lines)
            }
            CollectorOutcome::Failed(e) => self.failed(descriptor, &e),
        }
    }

    fn render_result(&self, result: &ResultSet, mode: &RenderMode) -> Result<Vec<String>> {
        TabularRenderer::new(&self.policy, self.config.flags).render(result, mode)
    }

    fn failed(&self, descriptor: &CollectorDescriptor, error: &DiagError) -> (SectionStatus, Vec<String>) {
        tracing::warn!("Collector '{}' failed: {}", descriptor.name(), error);
        let kind = FailureKind::of(error);
        let reason = error.to_string();
        let lines = match kind {
            FailureKind::Malformed => vec![render::malformed(error)],
            FailureKind::Boundary => render::no_results(Some(&reason)),
        };
        (SectionStatus::Failed { kind, reason }, lines)
    }

    fn header_lines(&self, run_id: Uuid, started_at: DateTime<Utc>) -> Vec<String> {
        let flags = self.config.flags;
        let caps = &self.config.capabilities;
        let target = self
            .policy
            .mask_text("host", &CellValue::Text(redact_target_url(&self.config.target)), &flags)
            .unwrap_or_default();
        let features: Vec<&str> = caps.features().collect();
        let on_off = |enabled: bool| if enabled { "on" } else { "off" };

        vec![
            "# Diagnostic report".to_string(),
            String::new(),
            format!("- Run id: `{}`", run_id),
            format!(
                "- Generated: {}",
                started_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            ),
            format!("- Tool version: dbdiag {}", env!("CARGO_PKG_VERSION")),
            format!("- Target: {}", render::single_line(&target)),
            format!("- Platform version: {}", caps.platform_version),
            format!("- Privilege level: {}", caps.privilege_level),
            format!(
                "- Features: {}",
                if features.is_empty() { "none".to_string() } else { features.join(", ") }
            ),
            format!("- Safe mode: {}", on_off(flags.safe_mode)),
            format!("- Extended section: {}", on_off(flags.export_extended_section)),
            String::new(),
        ]
    }

    fn footer_lines(&self, summary: &RunSummary) -> Vec<String> {
        let mut builder = ResultSet::builder("run_summary")
            .column("section")
            .column("collector")
            .column("status")
            .column("detail");
        for section in &summary.sections {
            builder = builder.row([
                CellValue::Integer(i64::try_from(section.index).unwrap_or(i64::MAX)),
                CellValue::from(section.name.as_str()),
                CellValue::from(section.status.label()),
                CellValue::from(section.status.detail()),
            ]);
        }

        let mut lines = vec!["# Run summary".to_string(), String::new()];
        lines.push(format!(
            "{} sections: {} populated, {} empty, {} skipped, {} failed.",
            summary.sections.len(),
            summary.populated(),
            summary.empty(),
            summary.skipped(),
            summary.failed()
        ));
        lines.push(String::new());

        match builder.build().and_then(|rs| self.render_result(&rs, &RenderMode::Csv)) {
            Ok(table) => lines.extend(table),
            Err(e) => {
                tracing::warn!("Summary table could not be rendered: {}", e);
                lines.push(render::malformed(&e));
            }
        }
        lines
    }
}
