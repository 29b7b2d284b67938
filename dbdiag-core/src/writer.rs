//! Chunked line output for sinks with a maximum atomic write size.
//!
//! A line longer than the sink limit is split into consecutive writes of
//! exactly `limit` characters (the last one shorter). Splits are counted in
//! Unicode scalar values, so a chunk boundary never falls inside a character,
//! and no whitespace is trimmed or added. An empty line is still one write.
//!
//! `{%n}` placeholder substitution happens before splitting.

use crate::error::{DiagError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Destination that accepts bounded writes and line terminations.
pub trait LineSink {
    /// Writes one chunk of a line; never larger than the writer's limit.
    ///
    /// # Errors
    /// Returns `DiagError::Sink` if the destination cannot be written.
    fn write_chunk(&mut self, chunk: &str) -> Result<()>;

    /// Terminates the current line.
    ///
    /// # Errors
    /// Returns `DiagError::Sink` if the destination cannot be written.
    fn end_line(&mut self) -> Result<()>;

    /// Flushes and finalizes buffered output.
    ///
    /// # Errors
    /// Returns `DiagError::Sink` if buffered data cannot be written.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: LineSink + ?Sized> LineSink for Box<S> {
    fn write_chunk(&mut self, chunk: &str) -> Result<()> {
        (**self).write_chunk(chunk)
    }

    fn end_line(&mut self) -> Result<()> {
        (**self).end_line()
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Splits `text` into chunks of at most `limit` characters.
///
/// Always returns at least one chunk; an empty string yields `[""]`.
pub fn split_units(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == limit {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count = count.saturating_add(1);
    }
    chunks.push(&text[start..]);
    chunks
}

/// Replaces `{%n}` placeholders with `args[n - 1]`.
///
/// Single pass: the longest run of digits after `{%` forms the token, so
/// `{%10}` is never read as `{%1}` followed by `0}`. Substituted text is not
/// scanned again, and tokens without a matching argument stay verbatim.
pub fn substitute_tokens(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{%") {
        out.push_str(&rest[..start]);
        let after = &rest[start..]["{%".len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let closed = digits > 0 && after.as_bytes().get(digits) == Some(&b'}');

        let argument = if closed {
            after[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| args.get(i))
        } else {
            None
        };

        match argument {
            Some(value) => {
                out.push_str(value);
                rest = &after[digits..][1..];
            }
            None => {
                out.push_str("{%");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Writer that never exceeds the sink's atomic write size.
#[derive(Debug)]
pub struct LineSafeWriter<S> {
    sink: S,
    limit: usize,
    writes: u64,
    lines: u64,
}

impl<S: LineSink> LineSafeWriter<S> {
    /// Wraps a sink with a per-write limit.
    ///
    /// # Errors
    /// Returns a configuration error if `limit` is zero.
    pub fn new(sink: S, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(DiagError::configuration(
                "Sink write limit must be greater than 0",
            ));
        }
        Ok(Self {
            sink,
            limit,
            writes: 0,
            lines: 0,
        })
    }

    /// Writes one logical line, split as needed.
    ///
    /// # Errors
    /// Propagates sink failures, which are fatal for a run.
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        for chunk in split_units(text, self.limit) {
            self.sink.write_chunk(chunk)?;
            self.writes = self.writes.saturating_add(1);
        }
        self.sink.end_line()?;
        self.lines = self.lines.saturating_add(1);
        Ok(())
    }

    /// Substitutes `{%n}` tokens, then writes the result as one line.
    ///
    /// # Errors
    /// Propagates sink failures.
    pub fn write_formatted(&mut self, template: &str, args: &[&str]) -> Result<()> {
        let line = substitute_tokens(template, args);
        self.write_line(&line)
    }

    /// Writes each line in order.
    ///
    /// # Errors
    /// Propagates sink failures.
    pub fn write_lines<I, T>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for line in lines {
            self.write_line(line.as_ref())?;
        }
        Ok(())
    }

    /// Finalizes the sink.
    ///
    /// # Errors
    /// Propagates sink failures.
    pub fn finish(&mut self) -> Result<()> {
        self.sink.finish()
    }

    /// Per-write limit in characters.
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Number of sink writes issued so far.
    pub const fn writes(&self) -> u64 {
        self.writes
    }

    /// Number of logical lines written so far.
    pub const fn lines(&self) -> u64 {
        self.lines
    }

    /// Borrows the sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Unwraps the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

/// In-memory sink recording every individual write.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    writes: Vec<String>,
    lines: Vec<String>,
    current: String,
}

impl MemorySink {
    /// Creates an empty memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every chunk passed to `write_chunk`, in order.
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    /// Completed lines (chunks rejoined).
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The whole document, lines joined with `\n`.
    pub fn contents(&self) -> String {
        let mut text = self.lines.join("\n");
        if !self.lines.is_empty() {
            text.push('\n');
        }
        text
    }
}

impl LineSink for MemorySink {
    fn write_chunk(&mut self, chunk: &str) -> Result<()> {
        self.writes.push(chunk.to_string());
        self.current.push_str(chunk);
        Ok(())
    }

    fn end_line(&mut self) -> Result<()> {
        self.lines.push(std::mem::take(&mut self.current));
        Ok(())
    }
}

/// Sink writing to standard output.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LineSink for ConsoleSink {
    fn write_chunk(&mut self, chunk: &str) -> Result<()> {
        std::io::stdout()
            .lock()
            .write_all(chunk.as_bytes())
            .map_err(|e| DiagError::sink_failed("Failed to write to stdout", e))
    }

    fn end_line(&mut self) -> Result<()> {
        std::io::stdout()
            .lock()
            .write_all(b"\n")
            .map_err(|e| DiagError::sink_failed("Failed to write to stdout", e))
    }

    fn finish(&mut self) -> Result<()> {
        std::io::stdout()
            .lock()
            .flush()
            .map_err(|e| DiagError::sink_failed("Failed to flush stdout", e))
    }
}

enum FileWriter {
    Plain(BufWriter<File>),
    #[cfg(feature = "compression")]
    Zstd(zstd::Encoder<'static, BufWriter<File>>),
}

impl FileWriter {
    fn as_write(&mut self) -> &mut dyn Write {
        match self {
            Self::Plain(w) => w,
            #[cfg(feature = "compression")]
            Self::Zstd(w) => w,
        }
    }
}

/// Sink writing to a file, optionally zstd-compressed.
pub struct FileSink {
    writer: FileWriter,
    path: String,
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink").field("path", &self.path).finish()
    }
}

impl FileSink {
    /// Creates or truncates `path`.
    ///
    /// # Errors
    /// Returns `DiagError::Sink` if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            DiagError::sink_failed(format!("Failed to create {}", path.display()), e)
        })?;
        Ok(Self {
            writer: FileWriter::Plain(BufWriter::new(file)),
            path: path.display().to_string(),
        })
    }

    /// Creates or truncates `path`, compressing the document with zstd.
    ///
    /// # Errors
    /// Returns `DiagError::Sink` if the file or encoder cannot be created.
    #[cfg(feature = "compression")]
    pub fn create_compressed(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            DiagError::sink_failed(format!("Failed to create {}", path.display()), e)
        })?;
        let encoder = zstd::Encoder::new(BufWriter::new(file), 3).map_err(|e| {
            DiagError::sink_failed("Failed to create compressor", e)
        })?;
        Ok(Self {
            writer: FileWriter::Zstd(encoder),
            path: path.display().to_string(),
        })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let path = &self.path;
        self.writer
            .as_write()
            .write_all(bytes)
            .map_err(|e| DiagError::sink_failed(format!("Failed to write to {}", path), e))
    }
}

impl LineSink for FileSink {
    fn write_chunk(&mut self, chunk: &str) -> Result<()> {
        self.write_bytes(chunk.as_bytes())
    }

    fn end_line(&mut self) -> Result<()> {
        self.write_bytes(b"\n")
    }

    fn finish(&mut self) -> Result<()> {
        let path = &self.path;
        match &mut self.writer {
            FileWriter::Plain(w) => w.flush(),
            #[cfg(feature = "compression")]
            FileWriter::Zstd(w) => w.do_finish().and_then(|()| w.get_mut().flush()),
        }
        .map_err(|e| DiagError::sink_failed(format!("Failed to finalize {}", path), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_boundaries() {
        assert_eq!(split_units("", 4), vec![""]);
        assert_eq!(split_units("abc", 4), vec!["abc"]);
        assert_eq!(split_units("abcd", 4), vec!["abcd"]);
        assert_eq!(split_units("abcde", 4), vec!["abcd", "e"]);
        assert_eq!(split_units("abcdefgh", 4), vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_split_preserves_whitespace() {
        let chunks = split_units("  ab  ", 3);
        assert_eq!(chunks, vec!["  a", "b  "]);
    }

    #[test]
    fn test_split_never_breaks_characters() {
        let text = "ééééé";
        let chunks = split_units(text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_oversized_line_writes() {
        let mut writer = LineSafeWriter::new(MemorySink::new(), 4000).unwrap();
        let line = "x".repeat(4001);
        writer.write_line(&line).unwrap();

        let lengths: Vec<_> = writer.sink().writes().iter().map(String::len).collect();
        assert_eq!(lengths, vec![4000, 1]);
        assert_eq!(writer.sink().lines(), &[line]);
        assert_eq!(writer.writes(), 2);
        assert_eq!(writer.lines(), 1);
    }

    #[test]
    fn test_empty_line_is_one_write() {
        let mut writer = LineSafeWriter::new(MemorySink::new(), 10).unwrap();
        writer.write_line("").unwrap();
        assert_eq!(writer.sink().writes(), &[String::new()]);
        assert_eq!(writer.sink().contents(), "\n");
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(LineSafeWriter::new(MemorySink::new(), 0).is_err());
    }

    #[test]
    fn test_substitute_tokens() {
        assert_eq!(
            substitute_tokens("{%1} of {%2}", &["3", "10"]),
            "3 of 10"
        );
        let args: Vec<String> = (1..=10).map(|i| format!("a{}", i)).collect();
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        assert_eq!(substitute_tokens("{%10}|{%1}", &refs), "a10|a1");
    }

    #[test]
    fn test_substitute_leaves_unknown_tokens() {
        assert_eq!(substitute_tokens("{%3} {%} {%x} {%", &["a"]), "{%3} {%} {%x} {%");
        assert_eq!(substitute_tokens("{%0}", &["a"]), "{%0}");
    }

    #[test]
    fn test_tokens_at_template_edges() {
        assert_eq!(substitute_tokens("{%1}", &["a"]), "a");
        assert_eq!(substitute_tokens("x{%1}{%2}", &["a", "b"]), "xab");
        assert_eq!(substitute_tokens("{%1", &["a"]), "{%1");
        assert_eq!(substitute_tokens("é{%1}é", &["a"]), "éaé");
    }

    #[test]
    fn test_counters_accumulate_across_lines() {
        let mut writer = LineSafeWriter::new(MemorySink::new(), 3).unwrap();
        writer.write_lines(["abcdefg", "", "xy"]).unwrap();

        assert_eq!(writer.writes(), 5);
        assert_eq!(writer.lines(), 3);
        assert_eq!(writer.sink().contents(), "abcdefg\n\nxy\n");
    }

    #[test]
    fn test_substituted_text_not_rescanned() {
        assert_eq!(substitute_tokens("{%1}", &["{%2}", "boom"]), "{%2}");
    }

    #[test]
    fn test_substitution_happens_before_splitting() {
        let mut writer = LineSafeWriter::new(MemorySink::new(), 4).unwrap();
        writer.write_formatted("ab{%1}", &["cdef"]).unwrap();
        assert_eq!(writer.sink().writes(), &["abcd".to_string(), "ef".to_string()]);
    }

    #[test]
    fn test_file_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        let mut writer = LineSafeWriter::new(FileSink::create(&path).unwrap(), 3).unwrap();
        writer.write_lines(["hello", "", "x"]).unwrap();
        writer.finish().unwrap();
        drop(writer);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n\nx\n");
    }

    #[test]
    fn test_file_sink_create_failure_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.md");
        assert!(matches!(
            FileSink::create(&path),
            Err(DiagError::Sink { .. })
        ));
    }
}
