//! Discovery Module for the Octopus compiler
//!
//! Recursively scans a directory for source files and compiles them in
//! parallel. One failing file never stops the others; every failure is
//! collected into the [`BatchReport`] with the path and error.

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::finalize::{CompilationResult, Compiler};
use crate::validate::CompilerError;

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Recursively find all files under `dir` with the given extension, sorted.
///
/// Unreadable entries below the root are skipped with a warning; a missing
/// or unreadable root is an error.
pub fn discover_sources(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, CompilerError> {
    fs::metadata(dir).map_err(|source| CompilerError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry during discovery");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH COMPILE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: CompilerError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successful compiles in discovery order.
    pub compiled: Vec<(PathBuf, CompilationResult)>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compile every source file under `dir` in parallel.
pub fn compile_dir(compiler: &Compiler, dir: &Path) -> Result<BatchReport, CompilerError> {
    let files = discover_sources(dir, &compiler.options().source_extension)?;

    let outcomes: Vec<(PathBuf, Result<CompilationResult, CompilerError>)> = files
        .into_par_iter()
        .map(|path| {
            let outcome = futures::executor::block_on(compiler.compile_file(&path));
            (path, outcome)
        })
        .collect();

    let mut report = BatchReport::default();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(result) => report.compiled.push((path, result)),
            Err(e) => {
                error!(path = %path.display(), code = e.code(), error = %e, "compile failed");
                report.failures.push(BatchFailure { path, error: e });
            }
        }
    }

    info!(
        dir = %dir.display(),
        compiled = report.compiled.len(),
        failed = report.failures.len(),
        "batch compile finished"
    );
    Ok(report)
}

/// Write each successful bundle under `out_dir`, mirroring its path relative
/// to `src_root` with `extension` swapped in. Returns the written paths.
pub fn write_bundles(
    report: &BatchReport,
    src_root: &Path,
    out_dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, CompilerError> {
    let mut written = Vec::with_capacity(report.compiled.len());

    for (path, result) in &report.compiled {
        let relative = path.strip_prefix(src_root).unwrap_or(path.as_path());
        let relative = match relative.file_name() {
            Some(_) => relative.to_path_buf(),
            None => continue,
        };
        let target = out_dir.join(relative).with_extension(extension);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| CompilerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&target, result.bundle()).map_err(|source| CompilerError::Io {
            path: target.clone(),
            source,
        })?;
        written.push(target);
    }

    Ok(written)
}
