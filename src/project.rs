//! Project wiring: manifest to descriptors to tasks.
//!
//! For every asset the project registers a compile task named after the
//! asset id and a `<id>-lint` task that runs after it. Three aggregate
//! tasks tie them together:
//!
//! - `lints` runs every lint task
//! - `compile` runs every compile task
//! - `default` runs `compile`, then watches each asset's sources and
//!   recompiles that asset on change. It blocks for the process lifetime.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::asset::{builtin_type, AssetDescriptor, AssetType, Declared, SetupContext, SetupError};
use crate::build::PipelineRunner;
use crate::config::{
    find_manifest_from, load_manifest, resolve_path, AssetDecl, ConfigError, Manifest, WatchConfig,
};
use crate::plugin::PluginRegistry;
use crate::task::{ActionError, TaskOutput, TaskRegistry, NO_DEPS};
use crate::watch::{WatchError, Watcher};

/// Aggregate task running every compile task.
pub const COMPILE_TASK: &str = "compile";
/// Aggregate task running every lint task.
pub const LINTS_TASK: &str = "lints";
/// Compile, then watch.
pub const DEFAULT_TASK: &str = "default";

/// Asset declarations used when no manifest declares any.
pub fn default_declarations() -> BTreeMap<String, AssetDecl> {
    let builtin = |src: &str, dest: &str| AssetDecl {
        src: src.to_string(),
        dest: dest.to_string(),
        compile: None,
        lint: None,
        compile_stages: Vec::new(),
        lint_stages: Vec::new(),
    };

    BTreeMap::from([
        ("js".to_string(), builtin("sources/js/**/*.js", "js")),
        ("scss".to_string(), builtin("sources/scss/**/*.scss", "css")),
    ])
}

/// A loaded project: root, settings and resolved asset descriptors.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    manifest_path: Option<PathBuf>,
    watch: WatchConfig,
    jobs: usize,
    descriptors: Vec<Arc<AssetDescriptor>>,
}

impl Project {
    /// Load a project with the built-in plugins.
    ///
    /// Without an explicit manifest, `assetpipe.toml` is searched upward from
    /// `root`; the directory it is found in becomes the project root.
    pub fn load(root: &Path, manifest: Option<&Path>) -> Result<Self, SetupError> {
        Self::load_with(root, manifest, PluginRegistry::with_builtins())
    }

    /// Load a project resolving plugins from `plugins`.
    pub fn load_with(
        root: &Path,
        manifest: Option<&Path>,
        plugins: PluginRegistry,
    ) -> Result<Self, SetupError> {
        let root = root
            .canonicalize()
            .map_err(|source| ConfigError::Io { path: root.to_path_buf(), source })?;

        // An explicit manifest keeps the given root; a discovered one moves
        // the root to its directory.
        let (root, manifest_path) = match manifest {
            Some(path) => (root, Some(path.to_path_buf())),
            None => match find_manifest_from(root.clone()) {
                Some(found) => {
                    let dir = found.parent().map(Path::to_path_buf).unwrap_or(root);
                    (dir, Some(found))
                }
                None => (root, None),
            },
        };

        let manifest = match &manifest_path {
            Some(path) => {
                tracing::debug!("Using manifest {}", path.display());
                load_manifest(path)?
            }
            None => {
                tracing::debug!("No manifest found, using default asset declarations");
                Manifest::default()
            }
        };

        let mut project = Self::from_manifest(&root, manifest, plugins)?;
        project.manifest_path = manifest_path;
        Ok(project)
    }

    /// Build a project from an already parsed manifest.
    pub fn from_manifest(
        root: &Path,
        manifest: Manifest,
        plugins: PluginRegistry,
    ) -> Result<Self, SetupError> {
        let config_dir = match &manifest.config_dir {
            Some(dir) => resolve_path(root, Path::new(dir)),
            None => root.to_path_buf(),
        };
        let ctx = SetupContext::new(plugins, config_dir);

        let declarations =
            if manifest.assets.is_empty() { default_declarations() } else { manifest.assets };

        let descriptors = declarations
            .iter()
            .map(|(id, decl)| -> Result<Arc<AssetDescriptor>, SetupError> {
                let asset_type: Box<dyn AssetType> = match Declared::from_decl(id, decl) {
                    Some(declared) => Box::new(declared),
                    None => builtin_type(id).ok_or_else(|| SetupError::UnknownAssetType(id.clone()))?,
                };
                AssetDescriptor::new(asset_type.as_ref(), &decl.src, &decl.dest, &ctx).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded {} asset types", descriptors.len());

        Ok(Self {
            root: root.to_path_buf(),
            manifest_path: None,
            watch: manifest.watch,
            jobs: manifest.jobs.unwrap_or(1),
            descriptors,
        })
    }

    /// Override the number of parallel file workers.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn watch_config(&self) -> &WatchConfig {
        &self.watch
    }

    pub fn descriptors(&self) -> &[Arc<AssetDescriptor>] {
        &self.descriptors
    }

    /// Pipeline runner for one descriptor.
    pub fn runner(&self, descriptor: &Arc<AssetDescriptor>) -> PipelineRunner {
        PipelineRunner::new(Arc::clone(descriptor)).with_root(&self.root).with_jobs(self.jobs)
    }

    /// Register per-asset and aggregate tasks.
    pub fn register_tasks(&self, registry: &Arc<TaskRegistry>) {
        for descriptor in &self.descriptors {
            let compile = self.runner(descriptor);
            registry.register(descriptor.compile_task(), NO_DEPS, move || {
                Ok(TaskOutput::from(compile.compile()?))
            });

            let lint = self.runner(descriptor);
            registry.register(descriptor.lint_task(), [descriptor.compile_task()], move || {
                Ok(TaskOutput::from(lint.lint()?))
            });
        }

        registry.register_aggregate(LINTS_TASK, self.descriptors.iter().map(|d| d.lint_task()));
        registry.register_aggregate(
            COMPILE_TASK,
            self.descriptors.iter().map(|d| d.compile_task().to_string()),
        );

        let bindings = self.watch_bindings();
        let root = self.root.clone();
        let config = self.watch.clone();
        let weak: Weak<TaskRegistry> = Arc::downgrade(registry);
        registry.register(DEFAULT_TASK, [COMPILE_TASK], move || -> Result<TaskOutput, ActionError> {
            let registry = weak.upgrade().ok_or("task registry is gone")?;
            let watcher = bind_watcher(registry, &root, config.clone(), &bindings)?;
            watcher.wait()
        });
    }

    /// Source glob and compile task of every asset.
    pub fn watch_bindings(&self) -> Vec<(String, String)> {
        self.descriptors
            .iter()
            .map(|d| (d.source_pattern.clone(), d.compile_task().to_string()))
            .collect()
    }

    /// Create a watcher with one binding per asset.
    pub fn watch(&self, registry: Arc<TaskRegistry>) -> Result<Watcher, WatchError> {
        bind_watcher(registry, &self.root, self.watch.clone(), &self.watch_bindings())
    }
}

fn bind_watcher(
    registry: Arc<TaskRegistry>,
    root: &Path,
    config: WatchConfig,
    bindings: &[(String, String)],
) -> Result<Watcher, WatchError> {
    let mut watcher = Watcher::new(registry, root, config);
    for (pattern, task) in bindings {
        watcher.bind(pattern, [task.as_str()])?;
    }
    Ok(watcher)
}
