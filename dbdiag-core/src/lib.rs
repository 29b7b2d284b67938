//! Collection, redaction and rendering engine for dbdiag reports.
//!
//! This crate runs an ordered plan of gated collectors against a live
//! system, captures each one's tabular output with a schema discovered at run
//! time, and streams one append-only Markdown document through a sink with a
//! bounded write size.
//!
//! # Security Guarantees
//! - All live system access is read-only
//! - Target credentials are masked in logs, errors and the report header
//! - SafeMode redacts sensitive columns uniformly at render time
//!
//! # Architecture
//! - `config`: write-once run configuration and capability snapshot
//! - `gate`: pure precondition evaluation
//! - `collector`: collector contract, descriptors and the report plan
//! - `schema`: runtime column discovery over opaque results
//! - `redaction`, `render`, `writer`: masking, encodings and chunked output
//! - `assembler`: the run loop with a per-collector error boundary
//! - `adapters`: live system implementations (SQLite)
//!
//! # Example
//! ```rust
//! use dbdiag_core::{
//!     CollectorDescriptor, FnCollector, LineSafeWriter, MemorySink, ReportPlan, ResultSet,
//! };
//!
//! let plan = ReportPlan::core_only(vec![CollectorDescriptor::new(
//!     "greeting",
//!     "Greeting",
//!     FnCollector::new(|_| ResultSet::builder("greeting").column("text").row(["hello"]).build().into()),
//! )])?;
//! assert_eq!(plan.len(), 1);
//!
//! let mut writer = LineSafeWriter::new(MemorySink::new(), 4000)?;
//! writer.write_line("hello")?;
//! assert_eq!(writer.sink().writes().len(), 1);
//! # Ok::<(), dbdiag_core::DiagError>(())
//! ```

pub mod adapters;
pub mod assembler;
pub mod collector;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod models;
pub mod redaction;
pub mod render;
pub mod schema;
pub mod store;
pub mod writer;

// Re-export commonly used types
pub use assembler::{FailureKind, RenderedSection, ReportAssembler, RunSummary, SectionStatus, SectionSummary};
pub use collector::{
    Collector, CollectorContext, CollectorDescriptor, CollectorOutcome, DerivedCollector, FnCollector,
    LiveSystem, QueryCollector, ReportPlan,
};
pub use config::{
    CapabilitySnapshot, OutputTarget, PlatformVersion, PrivilegeLevel, RunConfig, RunFlags,
};
pub use error::{DiagError, Result};
pub use gate::{GateDecision, Precondition};
pub use models::{CellValue, ColumnDescriptor, ResultSet, Row};
pub use redaction::{RedactionPolicy, SensitivePattern};
pub use render::{RenderMode, TabularRenderer};
pub use schema::{MemorySource, SchemaIntrospector, TabularSource};
pub use store::ResultStore;
pub use writer::{ConsoleSink, FileSink, LineSafeWriter, LineSink, MemorySink};

#[cfg(feature = "sqlite")]
pub use adapters::SqliteSystem;
