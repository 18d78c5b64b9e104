//! Pipeline result types.
//!
//! Contains types for representing the outcome of pipeline runs.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::plugin::{Diagnostic, Severity};

/// Which pipeline produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Compile,
    Lint,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Compile => write!(f, "compile"),
            PipelineKind::Lint => write!(f, "lint"),
        }
    }
}

/// Outcome of one compile or lint run for an asset.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Asset type identifier
    pub asset: String,
    pub kind: PipelineKind,
    /// Files matched by the source glob
    pub matched: usize,
    /// Files that made it through every stage
    pub transformed: usize,
    /// Partials excluded from the destination
    pub skipped_partials: usize,
    /// Files written to the destination
    pub written: Vec<PathBuf>,
    /// Per-file findings, in discovery order
    pub diagnostics: Vec<Diagnostic>,
    pub duration: Duration,
}

impl PipelineReport {
    /// Create an empty report.
    pub fn new(asset: impl Into<String>, kind: PipelineKind) -> Self {
        Self {
            asset: asset.into(),
            kind,
            matched: 0,
            transformed: 0,
            skipped_partials: 0,
            written: Vec::new(),
            diagnostics: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Number of error diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    }

    /// Number of warning diagnostics.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    /// True when no file produced an error.
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }

    /// Files that produced at least one error.
    pub fn failed_files(&self) -> HashSet<PathBuf> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.file.clone())
            .collect()
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} {}: {} matched, {} processed",
            self.asset, self.kind, self.matched, self.transformed
        );
        if self.kind == PipelineKind::Compile {
            summary.push_str(&format!(", {} written", self.written.len()));
        }
        if self.skipped_partials > 0 {
            summary.push_str(&format!(", {} partials skipped", self.skipped_partials));
        }
        let errors = self.error_count();
        if errors > 0 {
            summary.push_str(&format!(", {} errors", errors));
        }
        let warnings = self.warning_count();
        if warnings > 0 {
            summary.push_str(&format!(", {} warnings", warnings));
        }
        summary.push_str(&format!(" ({})", format_duration(self.duration)));
        summary
    }
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Tracks files with errors across runs for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files that had errors in the previous run
    files_with_errors: HashSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a new report, returns list of fixed files
    pub fn update(&mut self, report: &PipelineReport) -> Vec<PathBuf> {
        let current = report.failed_files();

        let mut fixed: Vec<PathBuf> = self.files_with_errors.difference(&current).cloned().collect();
        fixed.sort();

        self.files_with_errors = current;
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    /// Get the number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.len()
    }
}
