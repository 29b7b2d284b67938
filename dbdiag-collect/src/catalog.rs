//! Built-in SQLite collector catalog.
//!
//! The core part covers version, files, build options and the object
//! inventory. The extended part dumps object definitions and only runs when
//! `--export-extended` is set.

use dbdiag_core::{
    CellValue, CollectorDescriptor, CollectorOutcome, FnCollector, PlatformVersion, Precondition,
    RenderMode, ReportPlan, Result, ResultSet,
};
use std::collections::BTreeMap;

/// Oldest SQLite release the catalog supports.
pub const DEFAULT_MINIMUM_VERSION: PlatformVersion = PlatformVersion::new(3, 8, 0);

/// First release with the table-valued pragma functions.
const PRAGMA_FUNCTIONS: PlatformVersion = PlatformVersion::new(3, 16, 0);

/// First release with `pragma table_list`.
const TABLE_LIST_PRAGMA: PlatformVersion = PlatformVersion::new(3, 37, 0);

/// Compile option that provides the `dbstat` virtual table.
pub const DBSTAT_FEATURE: &str = "ENABLE_DBSTAT_VTAB";

const TABLE_LIST: &str = "table_list";
const TABLE_LIST_LEGACY: &str = "table_list_legacy";

/// Builds the report plan for SQLite targets.
///
/// # Errors
/// Returns a configuration error if the catalog declares a duplicate name.
pub fn sqlite_plan() -> Result<ReportPlan> {
    ReportPlan::new(core_descriptors(), extended_descriptors())
}

fn core_descriptors() -> Vec<CollectorDescriptor> {
    vec![
        CollectorDescriptor::query(
            "server_version",
            "Server version",
            "SELECT sqlite_version() AS version, sqlite_source_id() AS source_id",
        ),
        CollectorDescriptor::query("database_files", "Database files", "PRAGMA database_list")
            .with_note("File paths are masked in SafeMode"),
        CollectorDescriptor::query("compile_options", "Compile options", "PRAGMA compile_options"),
        CollectorDescriptor::query(
            TABLE_LIST,
            "Tables and views",
            "SELECT schema, name, type, ncol, wr, strict FROM pragma_table_list ORDER BY schema, name",
        )
        .with_precondition(Precondition::MinVersion(TABLE_LIST_PRAGMA)),
        CollectorDescriptor::query(
            TABLE_LIST_LEGACY,
            "Tables and views",
            "SELECT 'main' AS schema, name, type FROM sqlite_master \
             WHERE type IN ('table', 'view') ORDER BY name",
        )
        .with_precondition(Precondition::BelowVersion(TABLE_LIST_PRAGMA)),
        CollectorDescriptor::query(
            "index_list",
            "Indexes",
            "SELECT m.name AS table_name, il.name AS index_name, il.\"unique\" AS is_unique, \
             il.origin, il.partial \
             FROM sqlite_master AS m JOIN pragma_index_list(m.name) AS il \
             WHERE m.type = 'table' ORDER BY m.name, il.name",
        )
        .with_precondition(Precondition::MinVersion(PRAGMA_FUNCTIONS)),
        CollectorDescriptor::query(
            "foreign_keys",
            "Foreign keys",
            "SELECT m.name AS table_name, fk.id, fk.seq, fk.\"table\" AS referenced_table, \
             fk.\"from\" AS from_column, fk.\"to\" AS to_column, fk.on_update, fk.on_delete \
             FROM sqlite_master AS m JOIN pragma_foreign_key_list(m.name) AS fk \
             WHERE m.type = 'table' ORDER BY m.name, fk.id, fk.seq",
        )
        .with_precondition(Precondition::MinVersion(PRAGMA_FUNCTIONS)),
        CollectorDescriptor::query(
            "page_statistics",
            "Page statistics",
            "SELECT name, COUNT(*) AS pages, SUM(payload) AS payload_bytes, \
             SUM(unused) AS unused_bytes FROM dbstat \
             GROUP BY name ORDER BY pages DESC, name LIMIT 50",
        )
        .with_precondition(Precondition::feature(DBSTAT_FEATURE))
        .with_note("Top 50 objects by page count"),
        CollectorDescriptor::new(
            "object_counts",
            "Object counts",
            FnCollector::new(|ctx| {
                match ctx
                    .store
                    .get(TABLE_LIST)
                    .or_else(|| ctx.store.get(TABLE_LIST_LEGACY))
                {
                    Some(tables) => count_by_type(&tables).into(),
                    None => CollectorOutcome::absent_because("no table list was collected"),
                }
            }),
        )
        .with_note("Derived from the table list"),
    ]
}

fn extended_descriptors() -> Vec<CollectorDescriptor> {
    vec![
        CollectorDescriptor::query(
            "object_definitions",
            "Object definitions",
            "SELECT type, name, sql FROM sqlite_master WHERE sql IS NOT NULL ORDER BY type, name",
        )
        .with_render(RenderMode::code_block("sql", ["type", "name"], "sql")),
    ]
}

/// Counts table list rows per object type.
///
/// # Errors
/// Returns `MalformedResult` when the table list has no `type` column.
pub fn count_by_type(tables: &ResultSet) -> Result<ResultSet> {
    let type_index = tables
        .column_index("type")
        .ok_or_else(|| dbdiag_core::DiagError::missing_column("type"))?;

    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for row in tables.rows() {
        let kind = row.cells[type_index]
            .render_text()
            .map_or_else(|| "unknown".to_string(), |t| t.into_owned());
        let entry = counts.entry(kind).or_insert(0);
        *entry = entry.saturating_add(1);
    }

    counts
        .into_iter()
        .fold(
            ResultSet::builder("object_counts").column("type").column("count"),
            |builder, (kind, count)| builder.row([CellValue::Text(kind), CellValue::Integer(count)]),
        )
        .build()
}
