//! Text encodings for result sets and the placeholders for missing ones.
//!
//! Two encodings exist:
//! - CSV: header plus one physical line per row. Every field is quoted,
//!   embedded quotes are doubled, CR and LF are removed, and NULL is an empty
//!   quoted field. Wrapped in a ```` ```csv ```` fence.
//! - Code block: per row an optional title line, then the body column
//!   verbatim in a fenced block with trailing whitespace trimmed. CRLF, LF
//!   and lone CR all end a body line. A result without rows renders
//!   [`NO_ROWS`] instead of any block.
//!
//! A result without columns renders the "no results" placeholder in either
//! mode.
//!
//! Redaction is applied cell by cell while rendering, so the collected
//! `ResultSet` itself is never modified.

use crate::config::RunFlags;
use crate::error::{DiagError, Result};
use crate::models::ResultSet;
use crate::redaction::RedactionPolicy;
use crate::store::ResultStore;
use serde::{Deserialize, Serialize};

/// Placeholder for a section without a result.
pub const NO_RESULTS: &str = "_No results available._";

/// Marker for a code-block section whose result has no rows.
pub const NO_ROWS: &str = "_No rows returned._";

/// How a section body is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Fenced CSV with a header record
    #[default]
    Csv,
    /// One fenced block per row, for object definitions and similar source text
    CodeBlock {
        /// Column emitted inside the fence
        body_column: String,
        /// Columns joined with `.` into the bold title line
        title_columns: Vec<String>,
        /// Fence info string, e.g. `sql`; empty for none
        language: String,
    },
}

impl RenderMode {
    /// Code-block mode over `body_column`, titled by `title_columns`.
    pub fn code_block<I, S>(body_column: impl Into<String>, title_columns: I, language: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::CodeBlock {
            body_column: body_column.into(),
            title_columns: title_columns.into_iter().map(Into::into).collect(),
            language: language.into(),
        }
    }
}

/// Removes CR and LF so a value stays on one physical line.
pub fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], "")
}

/// "No results" placeholder, with the reason on a second line when known.
pub fn no_results(reason: Option<&str>) -> Vec<String> {
    let mut lines = vec![NO_RESULTS.to_string()];
    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        lines.push(format!("_Reason: {}_", single_line(reason)));
    }
    lines
}

/// Placeholder for a section whose gate said skip.
pub fn skipped(reason: &str) -> String {
    format!("_Skipped — precondition not met: {}_", single_line(reason))
}

/// Diagnostic line for a result whose shape could not be rendered.
pub fn malformed(error: &DiagError) -> String {
    format!("_{}_", single_line(&error.to_string()))
}

/// Renders result sets under a redaction policy and run flags.
#[derive(Debug, Clone, Copy)]
pub struct TabularRenderer<'a> {
    policy: &'a RedactionPolicy,
    flags: RunFlags,
}

impl<'a> TabularRenderer<'a> {
    /// Renderer applying `policy` under `flags`.
    pub const fn new(policy: &'a RedactionPolicy, flags: RunFlags) -> Self {
        Self { policy, flags }
    }

    /// Renders a result in the given mode, fenced and ready to write.
    ///
    /// # Errors
    /// Returns `MalformedResult` when a code-block column is missing.
    pub fn render(&self, result: &ResultSet, mode: &RenderMode) -> Result<Vec<String>> {
        if result.columns().is_empty() {
            return Ok(no_results(Some("result has no columns")));
        }
        match mode {
            RenderMode::Csv => {
                let mut lines = Vec::with_capacity(result.row_count().saturating_add(3));
                lines.push("```csv".to_string());
                lines.extend(self.render_csv(result)?);
                lines.push("```".to_string());
                Ok(lines)
            }
            RenderMode::CodeBlock {
                body_column,
                title_columns,
                language,
            } => self.render_code_block(result, body_column, title_columns, language),
        }
    }

    /// Header line plus one line per row, in row ordinal order.
    ///
    /// # Errors
    /// Returns `DiagError::Csv` if the CSV writer fails.
    pub fn render_csv(&self, result: &ResultSet) -> Result<Vec<String>> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        let header: Vec<String> = result.columns().iter().map(|c| single_line(&c.name)).collect();
        writer.write_record(&header).map_err(|e| csv_failed(result, e))?;

        for row in result.rows() {
            let fields = result.columns().iter().zip(&row.cells).map(|(column, cell)| {
                self.policy
                    .mask_text(&column.name, cell, &self.flags)
                    .map(|text| single_line(&text))
                    .unwrap_or_default()
            });
            writer
                .write_record(fields)
                .map_err(|e| csv_failed(result, e))?;
        }

        let bytes = writer.into_inner().map_err(|e| DiagError::Io {
            context: format!("Failed to finish CSV for '{}'", result.name()),
            source: e.into_error(),
        })?;

        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// One optional title line and one fenced body per row.
    ///
    /// # Errors
    /// Returns `MalformedResult` naming the first missing body or title column.
    pub fn render_code_block(
        &self,
        result: &ResultSet,
        body_column: &str,
        title_columns: &[String],
        language: &str,
    ) -> Result<Vec<String>> {
        let body_index = result
            .column_index(body_column)
            .ok_or_else(|| DiagError::missing_column(body_column))?;
        let title_indexes = title_columns
            .iter()
            .map(|name| {
                result
                    .column_index(name)
                    .ok_or_else(|| DiagError::missing_column(name.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;

        if result.is_empty() {
            return Ok(vec![NO_ROWS.to_string()]);
        }

        let mut lines = Vec::new();
        for (position, row) in result.rows().iter().enumerate() {
            if position > 0 {
                lines.push(String::new());
            }

            let title = title_indexes
                .iter()
                .zip(title_columns)
                .filter_map(|(&i, name)| self.policy.mask_text(name, &row.cells[i], &self.flags))
                .map(|part| single_line(part.trim()))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(".");
            if !title.is_empty() {
                lines.push(format!("**{}**", title));
            }

            let body = self
                .policy
                .mask_text(body_column, &row.cells[body_index], &self.flags)
                .unwrap_or_default();
            let body = body.trim_end_matches([' ', '\t', '\r', '\n']);
            let fence = fence_for(body);

            lines.push(format!("{}{}", fence, language));
            lines.extend(body_lines(body).map(str::to_string));
            lines.push(fence);
        }

        Ok(lines)
    }

    /// Renders a stored result by name, or the "no results" placeholder.
    ///
    /// # Errors
    /// See [`TabularRenderer::render`].
    pub fn render_stored(&self, store: &ResultStore, name: &str, mode: &RenderMode) -> Result<Vec<String>> {
        match store.get(name) {
            Some(result) => self.render(&result, mode),
            None => Ok(no_results(Some(&format!("'{}' was not collected", name)))),
        }
    }
}

/// Splits on CRLF, LF and lone CR alike.
fn body_lines(body: &str) -> impl Iterator<Item = &str> {
    body.split("\r\n").flat_map(|line| line.split(['\n', '\r']))
}

/// Backtick fence one longer than the longest run inside `body`, minimum 3.
fn fence_for(body: &str) -> String {
    let mut longest = 0usize;
    let mut current = 0usize;
    for ch in body.chars() {
        if ch == '`' {
            current = current.saturating_add(1);
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat(longest.saturating_add(1).max(3))
}

fn csv_failed(result: &ResultSet, source: csv::Error) -> DiagError {
    DiagError::Csv {
        context: format!("Failed to encode '{}'", result.name()),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn plain() -> RunFlags {
        RunFlags::default()
    }

    fn safe() -> RunFlags {
        RunFlags {
            safe_mode: true,
            export_extended_section: false,
        }
    }

    #[test]
    fn test_csv_empty_result_has_header_only() {
        let rs = ResultSet::builder("t")
            .column("a")
            .column("b")
            .column("c")
            .build()
            .unwrap();
        let policy = RedactionPolicy::default();
        let lines = TabularRenderer::new(&policy, plain()).render_csv(&rs).unwrap();
        assert_eq!(lines, vec![r#""a","b","c""#]);
    }

    #[test]
    fn test_csv_quotes_and_line_breaks() {
        let rs = ResultSet::builder("t")
            .column("said")
            .column("body")
            .row([CellValue::from(r#"He said "hi""#), "one\r\ntwo".into()])
            .build()
            .unwrap();
        let policy = RedactionPolicy::default();
        let lines = TabularRenderer::new(&policy, plain()).render_csv(&rs).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], r#""He said ""hi""","onetwo""#);
    }

    #[test]
    fn test_csv_null_is_empty_quoted_field() {
        let rs = ResultSet::builder("t")
            .column("a")
            .column("b")
            .row([CellValue::Null, CellValue::Integer(7)])
            .build()
            .unwrap();
        let policy = RedactionPolicy::default();
        let lines = TabularRenderer::new(&policy, plain()).render_csv(&rs).unwrap();
        assert_eq!(lines[1], r#""","7""#);
    }

    #[test]
    fn test_csv_applies_redaction() {
        let rs = ResultSet::builder("t")
            .column("login_name")
            .column("sessions")
            .row([CellValue::from("alice"), CellValue::Integer(3)])
            .row([CellValue::Null, CellValue::Integer(1)])
            .build()
            .unwrap();
        let policy = RedactionPolicy::default();

        let masked = TabularRenderer::new(&policy, safe()).render_csv(&rs).unwrap();
        assert_eq!(masked[1], r#""[SafeMode]","3""#);
        assert_eq!(masked[2], r#""[SafeMode]","1""#);

        let clear = TabularRenderer::new(&policy, plain()).render_csv(&rs).unwrap();
        assert_eq!(clear[1], r#""alice","3""#);
    }

    #[test]
    fn test_render_wraps_csv_in_fence() {
        let rs = ResultSet::builder("t").column("v").row(["x"]).build().unwrap();
        let policy = RedactionPolicy::default();
        let lines = TabularRenderer::new(&policy, plain())
            .render(&rs, &RenderMode::Csv)
            .unwrap();
        assert_eq!(lines, vec!["```csv", r#""v""#, r#""x""#, "```"]);
    }

    #[test]
    fn test_code_block_titles_and_trimming() {
        let rs = ResultSet::builder("defs")
            .column("type")
            .column("name")
            .column("sql")
            .row(["table", "users", "CREATE TABLE users (\n  id INTEGER\n)  \r\n\t"])
            .row([CellValue::Null, "idx".into(), "CREATE INDEX idx ON users(id)".into()])
            .build()
            .unwrap();
        let policy = RedactionPolicy::default();
        let mode = RenderMode::code_block("sql", ["type", "name"], "sql");
        let lines = TabularRenderer::new(&policy, plain()).render(&rs, &mode).unwrap();

        assert_eq!(
            lines,
            vec![
                "**table.users**",
                "```sql",
                "CREATE TABLE users (",
                "  id INTEGER",
                ")",
                "```",
                "",
                "**idx**",
                "```sql",
                "CREATE INDEX idx ON users(id)",
                "```",
            ]
        );
    }

    #[test]
    fn test_code_block_without_rows_is_marked() {
        let rs = ResultSet::builder("defs").column("name").column("sql").build().unwrap();
        let policy = RedactionPolicy::default();
        let mode = RenderMode::code_block("sql", ["name"], "sql");
        let lines = TabularRenderer::new(&policy, plain()).render(&rs, &mode).unwrap();
        assert_eq!(lines, vec![NO_ROWS]);

        let err = TabularRenderer::new(&policy, plain())
            .render_code_block(&rs, "definition", &[], "sql")
            .unwrap_err();
        assert!(matches!(err, DiagError::MalformedResult { .. }));
    }

    #[test]
    fn test_code_block_line_terminators() {
        let rs = ResultSet::builder("defs")
            .column("sql")
            .row(["a\r\nb\rc\nd"])
            .build()
            .unwrap();
        let policy = RedactionPolicy::default();
        let lines = TabularRenderer::new(&policy, plain())
            .render_code_block(&rs, "sql", &[], "")
            .unwrap();
        assert_eq!(lines, vec!["```", "a", "b", "c", "d", "```"]);
    }

    #[test]
    fn test_zero_column_result_renders_placeholder() {
        let rs = ResultSet::builder("nothing").build().unwrap();
        let policy = RedactionPolicy::default();
        for mode in [RenderMode::Csv, RenderMode::code_block("sql", Vec::<String>::new(), "sql")] {
            let lines = TabularRenderer::new(&policy, plain()).render(&rs, &mode).unwrap();
            assert_eq!(lines[0], NO_RESULTS);
            assert!(lines[1].contains("no columns"));
        }
    }

    #[test]
    fn test_code_block_missing_body_column() {
        let rs = ResultSet::builder("defs").column("name").row(["x"]).build().unwrap();
        let policy = RedactionPolicy::default();
        let err = TabularRenderer::new(&policy, plain())
            .render_code_block(&rs, "definition", &[], "sql")
            .unwrap_err();
        assert_eq!(malformed(&err), "_Malformed result: column 'definition' is missing_");
    }

    #[test]
    fn test_code_block_body_redacted_under_safe_mode() {
        let rs = ResultSet::builder("defs")
            .column("name")
            .column("sql")
            .row(["v_users", "SELECT 'alice'"])
            .build()
            .unwrap();
        let policy = RedactionPolicy::default();
        let lines = TabularRenderer::new(&policy, safe())
            .render_code_block(&rs, "sql", &["name".to_string()], "sql")
            .unwrap();
        assert!(lines.contains(&"[SafeMode]".to_string()));
        assert!(!lines.iter().any(|l| l.contains("alice")));
    }

    #[test]
    fn test_fence_grows_past_embedded_backticks() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("a ``` b"), "````");
    }

    #[test]
    fn test_render_stored_missing_name() {
        let policy = RedactionPolicy::default();
        let store = ResultStore::new();
        let lines = TabularRenderer::new(&policy, plain())
            .render_stored(&store, "waits", &RenderMode::Csv)
            .unwrap();
        assert_eq!(lines[0], NO_RESULTS);
        assert!(lines[1].contains("waits"));
    }

    #[test]
    fn test_placeholders_stay_single_line() {
        assert_eq!(
            skipped("requires feature X\nand more"),
            "_Skipped — precondition not met: requires feature Xand more_"
        );
        assert_eq!(no_results(None), vec![NO_RESULTS.to_string()]);
        assert_eq!(no_results(Some("  ")).len(), 1);
    }
}
