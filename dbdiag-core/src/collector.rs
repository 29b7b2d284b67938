//! Collector contract, descriptors and the validated report plan.
//!
//! A collector is a named unit that reads from the live system and hands back
//! one [`ResultSet`], a well-defined absence, or a failure. Collectors never
//! return `Err` to the engine: every platform-boundary error is folded into
//! [`CollectorOutcome::Failed`] so a single failure cannot abort a run.
//!
//! # Security Guarantees
//! - Collectors only see the live system through [`LiveSystem::query`], which
//!   implementations must keep read-only
//! - Stored results are shared immutably; no collector can alter another's

use crate::config::{CapabilitySnapshot, RunConfig};
use crate::error::{DiagError, Result};
use crate::gate::Precondition;
use crate::models::ResultSet;
use crate::render::RenderMode;
use crate::schema::{SchemaIntrospector, TabularSource};
use crate::store::ResultStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Handle to the system being diagnosed.
///
/// # Object Safety
/// This trait is object-safe; the engine holds it as `&dyn LiveSystem`.
#[async_trait]
pub trait LiveSystem: Send + Sync {
    /// Checks that the system is reachable.
    ///
    /// # Errors
    /// Returns a connection error if the system cannot be reached.
    async fn test_connection(&self) -> Result<()>;

    /// Probes version, privilege level and optional features once.
    ///
    /// # Errors
    /// Returns an error if the probe queries fail.
    async fn probe_capabilities(&self) -> Result<CapabilitySnapshot>;

    /// Runs one read-only query and returns the driver result.
    ///
    /// # Errors
    /// Returns `QueryExecution` or `InsufficientPrivileges` on rejection.
    async fn query(&self, sql: &str) -> Result<Box<dyn TabularSource + Send + Sync>>;
}

/// Everything a collector may consult while executing.
#[derive(Clone, Copy)]
pub struct CollectorContext<'a> {
    /// Name of the descriptor being executed
    pub name: &'a str,
    /// Live system queries run against
    pub system: &'a dyn LiveSystem,
    /// Frozen run configuration
    pub config: &'a RunConfig,
    /// Results of collectors that already succeeded in this run
    pub store: &'a ResultStore,
    /// Column discovery for query results
    pub introspector: &'a SchemaIntrospector,
}

impl fmt::Debug for CollectorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorContext")
            .field("name", &self.name)
            .field("stored", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// What a collector hands back.
#[derive(Debug)]
pub enum CollectorOutcome {
    /// A result, possibly with zero rows
    Produced(ResultSet),
    /// Nothing to report, with an optional explanation
    Absent(Option<String>),
    /// The collector ran but the platform or the result shape let it down
    Failed(DiagError),
}

impl CollectorOutcome {
    /// Absence with a reason.
    pub fn absent_because(reason: impl Into<String>) -> Self {
        Self::Absent(Some(reason.into()))
    }
}

impl From<Result<ResultSet>> for CollectorOutcome {
    fn from(result: Result<ResultSet>) -> Self {
        match result {
            Ok(rs) => Self::Produced(rs),
            Err(e) => Self::Failed(e),
        }
    }
}

/// A named, independently failable unit of collection.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Executes the collector. Never invoked when its gate says skip.
    async fn execute(&self, ctx: &CollectorContext<'_>) -> CollectorOutcome;
}

/// Runs a single read-only query and snapshots its result.
#[derive(Debug, Clone)]
pub struct QueryCollector {
    sql: String,
}

impl QueryCollector {
    /// Wraps one SQL statement.
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    /// Statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl Collector for QueryCollector {
    async fn execute(&self, ctx: &CollectorContext<'_>) -> CollectorOutcome {
        let source = match ctx.system.query(&self.sql).await {
            Ok(source) => source,
            Err(e) => {
                tracing::debug!("Query for '{}' failed: {}", ctx.name, e);
                return CollectorOutcome::Failed(e);
            }
        };
        ctx.introspector.snapshot(ctx.name, source.as_ref()).into()
    }
}

type CollectFn = dyn Fn(&CollectorContext<'_>) -> CollectorOutcome + Send + Sync;

/// Collector backed by an in-process closure.
pub struct FnCollector {
    func: Box<CollectFn>,
}

impl FnCollector {
    /// Wraps a synchronous closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&CollectorContext<'_>) -> CollectorOutcome + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for FnCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCollector").finish_non_exhaustive()
    }
}

#[async_trait]
impl Collector for FnCollector {
    async fn execute(&self, ctx: &CollectorContext<'_>) -> CollectorOutcome {
        (self.func)(ctx)
    }
}

type DeriveFn = dyn Fn(&ResultSet) -> Result<ResultSet> + Send + Sync;

/// Builds a result from a result stored earlier in the same run.
///
/// Returns `Absent` when the source collector did not produce anything
/// (skipped, failed, or declared later).
pub struct DerivedCollector {
    source: String,
    derive: Box<DeriveFn>,
}

impl DerivedCollector {
    /// Derives from the stored result named `source`.
    pub fn new<F>(source: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&ResultSet) -> Result<ResultSet> + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            derive: Box::new(derive),
        }
    }

    /// Name of the result this collector reads.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for DerivedCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedCollector")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Collector for DerivedCollector {
    async fn execute(&self, ctx: &CollectorContext<'_>) -> CollectorOutcome {
        match ctx.store.get(&self.source) {
            Some(source) => (self.derive)(&source).into(),
            None => CollectorOutcome::absent_because(format!(
                "source result '{}' was not collected",
                self.source
            )),
        }
    }
}

/// Immutable description of one report section.
#[derive(Clone)]
pub struct CollectorDescriptor {
    name: String,
    title: String,
    precondition: Precondition,
    collector: Arc<dyn Collector>,
    notes: Vec<String>,
    render: RenderMode,
}

impl fmt::Debug for CollectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorDescriptor")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("precondition", &self.precondition)
            .field("render", &self.render)
            .finish_non_exhaustive()
    }
}

impl CollectorDescriptor {
    /// Creates an always-run CSV descriptor.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        collector: impl Collector + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            precondition: Precondition::Always,
            collector: Arc::new(collector),
            notes: Vec::new(),
            render: RenderMode::Csv,
        }
    }

    /// Creates a descriptor running one read-only query.
    pub fn query(name: impl Into<String>, title: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(name, title, QueryCollector::new(sql))
    }

    /// Sets the gate evaluated before the collector runs.
    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }

    /// Adds a line of static provenance text.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Sets how the result is rendered.
    pub fn with_render(mut self, render: RenderMode) -> Self {
        self.render = render;
        self
    }

    /// Unique descriptor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Section heading.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Gate for this descriptor.
    pub fn precondition(&self) -> &Precondition {
        &self.precondition
    }

    /// Collector behind this descriptor.
    pub fn collector(&self) -> &dyn Collector {
        self.collector.as_ref()
    }

    /// Static provenance lines.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Render mode for the section body.
    pub fn render(&self) -> &RenderMode {
        &self.render
    }
}

/// Validated, ordered descriptor list.
///
/// The core part always runs. The extended part (structural definitions) is
/// appended only when the run enables `export_extended_section`.
#[derive(Debug, Clone, Default)]
pub struct ReportPlan {
    core: Vec<CollectorDescriptor>,
    extended: Vec<CollectorDescriptor>,
}

impl ReportPlan {
    /// Builds a plan from its two parts.
    ///
    /// # Errors
    /// Returns a configuration error if a name or title is blank, a name is
    /// used twice across both parts, or a code-block descriptor names no body
    /// column.
    pub fn new(core: Vec<CollectorDescriptor>, extended: Vec<CollectorDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();

        for descriptor in core.iter().chain(extended.iter()) {
            if descriptor.name.trim().is_empty() {
                return Err(DiagError::configuration("Collector name cannot be empty"));
            }
            if descriptor.title.trim().is_empty() {
                return Err(DiagError::configuration(format!(
                    "Collector '{}' has no section title",
                    descriptor.name
                )));
            }
            if !seen.insert(descriptor.name.as_str()) {
                return Err(DiagError::configuration(format!(
                    "Duplicate collector name '{}'",
                    descriptor.name
                )));
            }
            if let RenderMode::CodeBlock { body_column, .. } = &descriptor.render
                && body_column.trim().is_empty()
            {
                return Err(DiagError::configuration(format!(
                    "Collector '{}' renders a code block without a body column",
                    descriptor.name
                )));
            }
        }

        Ok(Self { core, extended })
    }

    /// A plan with only a core part.
    ///
    /// # Errors
    /// See [`ReportPlan::new`].
    pub fn core_only(core: Vec<CollectorDescriptor>) -> Result<Self> {
        Self::new(core, Vec::new())
    }

    /// Core descriptors in declared order.
    pub fn core(&self) -> &[CollectorDescriptor] {
        &self.core
    }

    /// Extended descriptors in declared order.
    pub fn extended(&self) -> &[CollectorDescriptor] {
        &self.extended
    }

    /// Total number of declared descriptors across both parts.
    pub fn len(&self) -> usize {
        self.core.len().saturating_add(self.extended.len())
    }

    /// Returns true when neither part declares a descriptor.
    pub fn is_empty(&self) -> bool {
        self.core.is_empty() && self.extended.is_empty()
    }

    /// Looks up a descriptor by name in either part.
    pub fn find(&self, name: &str) -> Option<&CollectorDescriptor> {
        self.core
            .iter()
            .chain(self.extended.iter())
            .find(|d| d.name == name)
    }
}
