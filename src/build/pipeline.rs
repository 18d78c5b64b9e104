//! Compile and lint pipelines.
//!
//! A pipeline is an iterator chain over the files matched by an asset's
//! source glob. Each file flows through the stages independently: a stage
//! failure becomes a diagnostic and drops that file only, the rest of the
//! stream keeps going.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;

use crate::asset::AssetDescriptor;
use crate::build::discovery::{is_partial, match_sources, source_base, DiscoveryError};
use crate::build::result::{PipelineKind, PipelineReport};
use crate::plugin::{Diagnostic, PluginHandle, Reporter, SourceFile, StageError};

/// Stage name used for read failures.
const READ_STAGE: &str = "read";
/// Stage name used for write failures.
const WRITE_STAGE: &str = "write";

/// Whole-run pipeline failure.
///
/// Per-file errors never end up here; they are diagnostics in the report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source glob could not be parsed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// Destination directory could not be created
    #[error("Failed to create destination {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to a single file.
#[derive(Debug)]
enum FileOutcome {
    /// Passed every stage, with the written path for compile runs
    Passed(Option<PathBuf>),
    /// Excluded by the partial filter
    Partial,
    /// Dropped by a stage or a failure
    Dropped,
}

/// Runs the compile and lint pipelines of one asset.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    descriptor: Arc<AssetDescriptor>,
    /// Directory globs and destinations are resolved against
    root: PathBuf,
    /// Number of files processed concurrently
    jobs: usize,
}

impl PipelineRunner {
    /// Create a runner resolving paths against the current directory.
    pub fn new(descriptor: Arc<AssetDescriptor>) -> Self {
        Self { descriptor, root: PathBuf::from("."), jobs: 1 }
    }

    /// Set the project root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn descriptor(&self) -> &AssetDescriptor {
        &self.descriptor
    }

    /// Absolute destination directory.
    pub fn dest_dir(&self) -> PathBuf {
        self.root.join(&self.descriptor.dest_path)
    }

    /// Compile pipeline: transform, partial filter, extra stages, write.
    pub fn compile(&self) -> Result<PipelineReport, PipelineError> {
        let dest = self.dest_dir();
        fs::create_dir_all(&dest).map_err(|source| PipelineError::Io { path: dest.clone(), source })?;

        self.run(PipelineKind::Compile, |file, reporter| self.compile_file(file, &dest, reporter))
    }

    /// Lint pipeline: lint stage then extra lint stages. Nothing is written.
    pub fn lint(&self) -> Result<PipelineReport, PipelineError> {
        self.run(PipelineKind::Lint, |file, reporter| self.lint_file(file, reporter))
    }

    fn run<F>(&self, kind: PipelineKind, process: F) -> Result<PipelineReport, PipelineError>
    where
        F: Fn(SourceFile, &Reporter) -> FileOutcome + Sync,
    {
        let start = Instant::now();
        let desc = &self.descriptor;
        let base = source_base(&self.root, &desc.source_pattern);
        let sources = match_sources(&self.root, &desc.source_pattern)?;

        tracing::debug!("Running {} {} over {}", desc.id, kind, desc.source_pattern);

        let handle_path = |path: PathBuf| -> (FileOutcome, Vec<Diagnostic>) {
            let reporter = Reporter::new();
            let outcome = match fs::read(&path) {
                Ok(contents) => process(SourceFile::new(&path, &base, contents), &reporter),
                Err(e) => {
                    reporter.report(Diagnostic::error(&path, READ_STAGE, &StageError::new(e.to_string())));
                    FileOutcome::Dropped
                }
            };
            (outcome, reporter.into_diagnostics())
        };

        let outcomes: Vec<(FileOutcome, Vec<Diagnostic>)> = if self.jobs > 1 {
            let paths: Vec<PathBuf> = sources.collect();
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => pool.install(|| paths.into_par_iter().map(&handle_path).collect()),
                Err(e) => {
                    tracing::warn!("Failed to start worker pool, running sequentially: {}", e);
                    paths.into_iter().map(&handle_path).collect()
                }
            }
        } else {
            sources.map(&handle_path).collect()
        };

        let mut report = PipelineReport::new(&desc.id, kind);
        for (outcome, diagnostics) in outcomes {
            report.matched += 1;
            report.diagnostics.extend(diagnostics);
            match outcome {
                FileOutcome::Passed(written) => {
                    report.transformed += 1;
                    report.written.extend(written);
                }
                FileOutcome::Partial => report.skipped_partials += 1,
                FileOutcome::Dropped => {}
            }
        }
        report.duration = start.elapsed();

        tracing::info!("{}", report.summary());
        Ok(report)
    }

    fn compile_file(&self, file: SourceFile, dest: &Path, reporter: &Reporter) -> FileOutcome {
        let desc = &self.descriptor;
        let Some(file) = apply_stage(&desc.transform, file, reporter) else {
            return FileOutcome::Dropped;
        };

        if is_partial(&file.path) {
            tracing::debug!("Skipping partial {}", file.path.display());
            return FileOutcome::Partial;
        }

        let Some(file) = apply_stages(&desc.extra_compile_stages, file, reporter) else {
            return FileOutcome::Dropped;
        };

        let out_path = dest.join(file.relative());
        match write_output(&out_path, &file.contents) {
            Ok(()) => {
                tracing::debug!("Wrote {}", out_path.display());
                FileOutcome::Passed(Some(out_path))
            }
            Err(e) => {
                reporter.report(Diagnostic::error(
                    &file.path,
                    WRITE_STAGE,
                    &StageError::new(format!("{}: {}", out_path.display(), e)),
                ));
                FileOutcome::Dropped
            }
        }
    }

    fn lint_file(&self, file: SourceFile, reporter: &Reporter) -> FileOutcome {
        let desc = &self.descriptor;
        let passed = apply_stage(&desc.lint, file, reporter)
            .and_then(|file| apply_stages(&desc.extra_lint_stages, file, reporter));
        match passed {
            Some(_) => FileOutcome::Passed(None),
            None => FileOutcome::Dropped,
        }
    }
}

/// Run one stage, turning a failure into a diagnostic.
fn apply_stage(handle: &PluginHandle, file: SourceFile, reporter: &Reporter) -> Option<SourceFile> {
    let path = file.path.clone();
    match handle.stage.apply(file, reporter) {
        Ok(out) => out,
        Err(e) => {
            reporter.report(Diagnostic::error(&path, &handle.name, &e));
            None
        }
    }
}

/// Run stages in order until one drops the file.
fn apply_stages(
    handles: &[PluginHandle],
    file: SourceFile,
    reporter: &Reporter,
) -> Option<SourceFile> {
    handles.iter().try_fold(file, |file, handle| apply_stage(handle, file, reporter))
}

fn write_output(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}
