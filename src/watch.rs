//! Watch mode: re-run tasks when matching files change.
//!
//! Each binding pairs a source glob with the tasks it triggers. A debounced
//! batch of changes that touches at least one matching path runs those
//! tasks, in order, on a fresh thread. Batches are not queued behind each
//! other, so runs triggered in quick succession may overlap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use glob::Pattern;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use thiserror::Error;

use crate::build::{compile_pattern, source_base, DiscoveryError, ErrorTracker};
use crate::config::WatchConfig;
use crate::task::TaskRegistry;

/// Error during watch setup
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Watch pattern could not be parsed
    #[error(transparent)]
    Pattern(#[from] DiscoveryError),
}

/// Runs the tasks of one binding for a batch of changed paths.
struct Dispatch {
    pattern: Pattern,
    task_names: Vec<String>,
    registry: Arc<TaskRegistry>,
    /// Keyed by "<asset> <kind>"
    trackers: Mutex<HashMap<String, ErrorTracker>>,
}

impl Dispatch {
    /// Start the tasks if any path matches. Returns the worker thread.
    fn handle(self: &Arc<Self>, paths: &[PathBuf]) -> Option<JoinHandle<()>> {
        let changed: Vec<&PathBuf> = paths.iter().filter(|p| self.pattern.matches_path(p)).collect();
        if changed.is_empty() {
            return None;
        }
        for path in &changed {
            tracing::info!("Changed: {}", path.display());
        }

        let dispatch = Arc::clone(self);
        Some(thread::spawn(move || dispatch.run_tasks()))
    }

    fn run_tasks(&self) {
        for name in &self.task_names {
            match self.registry.invoke(name) {
                Ok(invocation) => {
                    let mut trackers = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
                    for report in invocation.reports() {
                        let key = format!("{} {}", report.asset, report.kind);
                        for fixed in trackers.entry(key).or_default().update(report) {
                            tracing::info!("Fixed: {}", fixed.display());
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    break;
                }
            }
        }
    }
}

/// A glob and the tasks it triggers.
pub struct WatchBinding {
    pub pattern: String,
    pub task_names: Vec<String>,
    /// Directory handed to the file system watcher
    pub watch_root: PathBuf,
    dispatch: Arc<Dispatch>,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl std::fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchBinding")
            .field("pattern", &self.pattern)
            .field("task_names", &self.task_names)
            .field("watch_root", &self.watch_root)
            .finish()
    }
}

/// File watcher dispatching changes to registered tasks.
pub struct Watcher {
    registry: Arc<TaskRegistry>,
    root: PathBuf,
    config: WatchConfig,
    bindings: Vec<WatchBinding>,
}

impl Watcher {
    /// Create a watcher resolving patterns against `root`.
    pub fn new(registry: Arc<TaskRegistry>, root: impl Into<PathBuf>, config: WatchConfig) -> Self {
        let root = root.into();
        // Event paths are absolute, so patterns must be too.
        let root = root.canonicalize().unwrap_or(root);
        Self { registry, root, config, bindings: Vec::new() }
    }

    /// Watch `pattern` and run `task_names` in order on matching changes.
    ///
    /// The watch is installed on the pattern's glob base, or on its nearest
    /// existing ancestor when the base does not exist yet.
    pub fn bind<I, S>(&mut self, pattern: &str, task_names: I) -> Result<(), WatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let task_names: Vec<String> = task_names.into_iter().map(Into::into).collect();
        let dispatch = Arc::new(Dispatch {
            pattern: compile_pattern(&self.root, pattern)?,
            task_names: task_names.clone(),
            registry: Arc::clone(&self.registry),
            trackers: Mutex::new(HashMap::new()),
        });

        let handler_dispatch = Arc::clone(&dispatch);
        let debounce = Duration::from_millis(self.config.debounce_ms as u64);
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                handler_dispatch.handle(&paths);
            }
            Err(error) => {
                // Non-fatal, keep watching
                tracing::warn!("Watch error: {:?}", error);
            }
        })
        .map_err(WatchError::WatcherInit)?;

        let watch_root = existing_ancestor(&source_base(&self.root, pattern));
        debouncer
            .watcher()
            .watch(&watch_root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: watch_root.clone(), source })?;

        tracing::info!("Watching {} -> [{}]", pattern, task_names.join(", "));
        self.bindings.push(WatchBinding {
            pattern: pattern.to_string(),
            task_names,
            watch_root,
            dispatch,
            _debouncer: debouncer,
        });
        Ok(())
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Dispatch a batch of changed paths as if the file system reported it.
    ///
    /// Returns the worker threads that were started.
    pub fn trigger(&self, paths: &[PathBuf]) -> Vec<JoinHandle<()>> {
        self.bindings.iter().filter_map(|b| b.dispatch.handle(paths)).collect()
    }

    /// Block the calling thread for the rest of the process.
    pub fn wait(&self) -> ! {
        loop {
            thread::park();
        }
    }
}

fn existing_ancestor(path: &Path) -> PathBuf {
    let mut current = path;
    while !current.exists() {
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent,
            _ => return PathBuf::from("."),
        }
    }
    if current != path {
        tracing::debug!("{} does not exist, watching {}", path.display(), current.display());
    }
    current.to_path_buf()
}
