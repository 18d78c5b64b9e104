//! Capability registry mapping plugin names to stage factories.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::builtin;
use super::stage::Stage;
use crate::config::AssetConfig;

/// Prefix for plugins backed by an external program.
pub const EXEC_PREFIX: &str = "exec:";

/// Builds a stage from plugin options.
pub type StageFactory =
    Arc<dyn Fn(&AssetConfig) -> Result<Arc<dyn Stage>, PluginError> + Send + Sync>;

/// Error resolving a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// No capability with this name is available
    #[error("Plugin not found: '{0}'")]
    NotFound(String),
    /// The plugin rejected its options
    #[error("Invalid options for plugin '{plugin}': {message}")]
    InvalidOptions { plugin: String, message: String },
}

/// A resolved plugin: its name and the stage it produced.
#[derive(Clone)]
pub struct PluginHandle {
    pub name: String,
    pub stage: Arc<dyn Stage>,
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle").field("name", &self.name).finish()
    }
}

/// Registry of named processing capabilities.
///
/// Names map to factories so a plugin can be instantiated with per-asset
/// options. Registering an existing name replaces the previous factory.
///
/// # Example
///
/// ```
/// use assetpipe::plugin::PluginRegistry;
///
/// let registry = PluginRegistry::with_builtins();
/// assert!(registry.contains("copy"));
/// assert!(registry.resolve("exec:").is_err());
/// ```
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, StageFactory>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Create a registry holding the built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Register a stage factory under a name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&AssetConfig) -> Result<Arc<dyn Stage>, PluginError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a ready-made stage that ignores options.
    pub fn register_stage(&mut self, name: impl Into<String>, stage: Arc<dyn Stage>) {
        self.register(name, move |_| Ok(Arc::clone(&stage)));
    }

    /// Resolve a plugin with empty options.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Stage>, PluginError> {
        self.resolve_with(name, &AssetConfig::default())
    }

    /// Resolve a plugin, passing it the given options.
    ///
    /// `exec:<program>` names resolve when the program can be found on
    /// `PATH` (or is an existing file path).
    pub fn resolve_with(
        &self,
        name: &str,
        options: &AssetConfig,
    ) -> Result<Arc<dyn Stage>, PluginError> {
        if let Some(factory) = self.factories.get(name) {
            tracing::debug!("Resolved plugin '{}'", name);
            return factory(options);
        }

        if let Some(program) = name.strip_prefix(EXEC_PREFIX) {
            let program_path =
                find_program(program).ok_or_else(|| PluginError::NotFound(name.to_string()))?;
            tracing::debug!("Resolved plugin '{}' to {}", name, program_path.display());
            return builtin::ExecStage::from_options(name, program_path, options)
                .map(|s| Arc::new(s) as Arc<dyn Stage>);
        }

        Err(PluginError::NotFound(name.to_string()))
    }

    /// Check whether a capability is registered under `name`.
    ///
    /// `exec:` names are not registered; they resolve on demand.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a plugin into a named handle.
    pub fn handle(&self, name: &str, options: &AssetConfig) -> Result<PluginHandle, PluginError> {
        Ok(PluginHandle { name: name.to_string(), stage: self.resolve_with(name, options)? })
    }
}

/// Locate an executable by name on `PATH`.
///
/// Names containing a path separator are checked directly.
pub fn find_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }

    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::stage::{Reporter, SourceFile, StageError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper;

    impl Stage for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn apply(&self, file: SourceFile, _: &Reporter) -> Result<Option<SourceFile>, StageError> {
            let text = file.text()?.to_uppercase();
            Ok(Some(file.with_contents(text)))
        }
    }

    #[test]
    fn test_resolve_unknown_is_not_found() {
        let registry = PluginRegistry::new();
        let err = registry.resolve("gulp-sass").unwrap_err();
        assert_eq!(err, PluginError::NotFound("gulp-sass".to_string()));
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = PluginRegistry::new();
        registry.register_stage("upper", Arc::new(Upper));

        let stage = registry.resolve("upper").unwrap();
        let out = stage
            .apply(SourceFile::new("/a.txt", "/", b"abc".to_vec()), &Reporter::new())
            .unwrap()
            .unwrap();
        assert_eq!(out.contents, b"ABC");
        assert!(registry.contains("upper"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_factory_receives_options() {
        let mut registry = PluginRegistry::new();
        registry.register("checked", |options: &AssetConfig| {
            if options.get_bool("enabled") == Some(true) {
                Ok(Arc::new(Upper) as Arc<dyn Stage>)
            } else {
                Err(PluginError::InvalidOptions {
                    plugin: "checked".into(),
                    message: "enabled must be true".into(),
                })
            }
        });

        assert!(registry.resolve("checked").is_err());
        assert!(registry.resolve_with("checked", &AssetConfig::new().with("enabled", true)).is_ok());
    }

    #[test]
    fn test_reregister_last_write_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::new();
        registry.register_stage("p", Arc::new(Upper));
        let counter = Arc::clone(&calls);
        registry.register("p", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Upper) as Arc<dyn Stage>)
        });

        registry.resolve("p").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtins_present() {
        let registry = PluginRegistry::with_builtins();
        for name in ["copy", "json-minify", "json-lint", "css", "css-lint", "autoprefixer"] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
        let names = registry.names();
        assert!(names.contains(&"whitespace-lint"));
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_exec_missing_program_not_found() {
        let registry = PluginRegistry::with_builtins();
        let err = registry.resolve("exec:definitely-not-a-real-program-4821").unwrap_err();
        assert!(matches!(err, PluginError::NotFound(name) if name.starts_with("exec:")));
    }

    #[test]
    fn test_handle_carries_name() {
        let registry = PluginRegistry::with_builtins();
        let handle = registry.handle("copy", &AssetConfig::default()).unwrap();
        assert_eq!(handle.name, "copy");
        assert_eq!(handle.stage.name(), "copy");
    }

    #[test]
    fn test_find_program_empty_and_missing() {
        assert!(find_program("").is_none());
        assert!(find_program("/no/such/dir/tool").is_none());
    }
}
