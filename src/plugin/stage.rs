//! Stream stage abstractions.
//!
//! A [`Stage`] is a single step of a file pipeline: it receives one
//! [`SourceFile`] and yields zero or one file. Stages report non-fatal
//! findings through a [`Reporter`]; the runner creates one per file so each
//! file's diagnostics stay together in discovery order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// A file record flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Current path of the file (stages may change the extension)
    pub path: PathBuf,
    /// Glob base the file was matched under
    pub base: PathBuf,
    /// File contents
    pub contents: Vec<u8>,
}

impl SourceFile {
    /// Create a new source file record.
    pub fn new(path: impl Into<PathBuf>, base: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self { path: path.into(), base: base.into(), contents }
    }

    /// Path relative to the glob base.
    ///
    /// Falls back to the file name when the path is not under the base.
    pub fn relative(&self) -> PathBuf {
        match self.path.strip_prefix(&self.base) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => self.path.file_name().map(PathBuf::from).unwrap_or_default(),
        }
    }

    /// File name as a string (empty for paths without one).
    pub fn file_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }

    /// Contents decoded as UTF-8.
    pub fn text(&self) -> Result<&str, StageError> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| StageError::new(format!("{} is not valid UTF-8: {}", self.path.display(), e)))
    }

    /// Replace the contents.
    pub fn with_contents(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.contents = contents.into();
        self
    }

    /// Replace the extension of the path.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.path.set_extension(extension);
        self
    }
}

/// Per-file stage failure.
///
/// Never aborts a pipeline; the runner turns it into a diagnostic and drops
/// the offending file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StageError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed) if known
    pub line: Option<usize>,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), line: None }
    }

    pub fn at_line(message: impl Into<String>, line: usize) -> Self {
        Self { message: message.into(), line: Some(line) }
    }
}

/// A single stream transform.
pub trait Stage: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Process one file.
    ///
    /// Returns `Ok(None)` to drop the file from the stream without error.
    fn apply(&self, file: SourceFile, reporter: &Reporter) -> Result<Option<SourceFile>, StageError>;
}

impl fmt::Debug for dyn Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage({})", self.name())
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A finding reported while processing a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// File the diagnostic refers to
    pub file: PathBuf,
    /// Stage that produced it
    pub stage: String,
    pub severity: Severity,
    pub message: String,
    /// Line number (1-indexed, None if unknown)
    pub line: Option<usize>,
}

impl Diagnostic {
    pub fn error(file: &Path, stage: &str, error: &StageError) -> Self {
        Self {
            file: file.to_path_buf(),
            stage: stage.to_string(),
            severity: Severity::Error,
            message: error.message.clone(),
            line: error.line,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        write!(f, ": {} [{}]: {}", self.severity, self.stage, self.message)
    }
}

/// Thread-safe diagnostic collector for one file's trip through a pipeline.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and emit it as a warning log event.
    pub fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
        self.lock().push(diagnostic);
    }

    /// Record a warning for a file.
    pub fn warn(&self, file: &Path, stage: &str, line: Option<usize>, message: impl Into<String>) {
        self.report(Diagnostic {
            file: file.to_path_buf(),
            stage: stage.to_string(),
            severity: Severity::Warning,
            message: message.into(),
            line,
        });
    }

    /// Number of diagnostics collected so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the reporter and return the collected diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self.diagnostics.into_inner() {
            Ok(d) => d,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // A panicking stage must not take the other files down with it.
        match self.diagnostics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
