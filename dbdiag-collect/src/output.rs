//! Report sink selection.
//!
//! Opens the file or console sink for a run, with optional zstd compression
//! and an optional fallback to stdout when the file cannot be created.

use dbdiag_core::{ConsoleSink, DiagError, FileSink, LineSink, OutputTarget, Result};
use std::path::{Path, PathBuf};

/// Boxed sink the assembler writes through.
pub type ReportSink = Box<dyn LineSink + Send>;

/// Output path for a compressed report, adding `.zst` when missing.
pub fn compressed_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "zst") {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".zst");
        PathBuf::from(name)
    }
}

/// Resolves the output target for a run.
pub fn output_target(output: Option<&Path>, compress: bool) -> OutputTarget {
    match output {
        Some(path) if compress => OutputTarget::File(compressed_path(path)),
        Some(path) => OutputTarget::File(path.to_path_buf()),
        None => OutputTarget::Console,
    }
}

/// Opens the sink for `target`.
///
/// # Errors
/// Returns `DiagError::Sink` if the file cannot be created and
/// `console_fallback` is off, or a configuration error when compression was
/// requested without the `compression` feature.
pub fn open_sink(target: &OutputTarget, compress: bool, console_fallback: bool) -> Result<ReportSink> {
    let path = match target {
        OutputTarget::Console => {
            if compress {
                tracing::warn!("--compress ignored: the report goes to stdout");
            }
            return Ok(Box::new(ConsoleSink));
        }
        OutputTarget::File(path) => path,
    };

    match create_file_sink(path, compress) {
        Ok(sink) => Ok(sink),
        Err(e @ DiagError::Sink { .. }) if console_fallback => {
            tracing::warn!("{}; writing the report to stdout instead", e);
            Ok(Box::new(ConsoleSink))
        }
        Err(e) => Err(e),
    }
}

fn create_file_sink(path: &Path, compress: bool) -> Result<ReportSink> {
    if compress {
        #[cfg(feature = "compression")]
        {
            Ok(Box::new(FileSink::create_compressed(path)?))
        }
        #[cfg(not(feature = "compression"))]
        {
            Err(DiagError::configuration(
                "Compression not available. Compile with --features compression",
            ))
        }
    } else {
        Ok(Box::new(FileSink::create(path)?))
    }
}
