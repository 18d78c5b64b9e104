//! Asset types and descriptors.
//!
//! An [`AssetType`] names the plugins for one category of source files and
//! may contribute extra pipeline stages. [`AssetDescriptor::new`] turns an
//! asset type plus a source glob and destination into a fully resolved
//! descriptor: config loaded, plugins resolved, stages built.
//!
//! New asset types only need to implement [`AssetType`]; task registration
//! and pipeline execution work on descriptors and never change.

mod types;

pub use types::{Css, Declared, Js, Json, Scss};

use std::path::PathBuf;

use thiserror::Error;

use crate::config::{load_asset_config, AssetConfig, ConfigError, LINT_SECTION};
use crate::plugin::{PluginError, PluginHandle, PluginRegistry};

/// Fatal error while building descriptors at startup.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A plugin could not be resolved
    #[error("asset '{asset}': {source}")]
    Plugin {
        asset: String,
        #[source]
        source: PluginError,
    },
    /// A config file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A manifest entry names no plugins and no built-in type has its id
    #[error("asset '{0}' declares no plugins and is not a built-in type ({})", BUILTIN_TYPES.join(", "))]
    UnknownAssetType(String),
}

/// Ids of the built-in asset types.
pub const BUILTIN_TYPES: [&str; 4] = ["css", "js", "json", "scss"];

/// Look up a built-in asset type by id.
pub fn builtin_type(id: &str) -> Option<Box<dyn AssetType>> {
    match id {
        "css" => Some(Box::new(Css)),
        "js" => Some(Box::new(Js)),
        "json" => Some(Box::new(Json)),
        "scss" => Some(Box::new(Scss)),
        _ => None,
    }
}

/// Everything needed to resolve plugins for asset types.
#[derive(Clone)]
pub struct SetupContext {
    plugins: PluginRegistry,
    config_dir: PathBuf,
}

impl SetupContext {
    /// Create a context resolving plugins from `plugins` and reading
    /// `.<id>-config.toml` files from `config_dir`.
    pub fn new(plugins: PluginRegistry, config_dir: impl Into<PathBuf>) -> Self {
        Self { plugins, config_dir: config_dir.into() }
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn config_dir(&self) -> &std::path::Path {
        &self.config_dir
    }

    /// Load the config for an identifier.
    pub fn config(&self, id: &str) -> Result<AssetConfig, ConfigError> {
        load_asset_config(&self.config_dir, id)
    }

    /// Resolve a plugin for `asset` with the given options.
    pub fn resolve(
        &self,
        asset: &str,
        plugin: &str,
        options: &AssetConfig,
    ) -> Result<PluginHandle, SetupError> {
        self.plugins
            .handle(plugin, options)
            .map_err(|source| SetupError::Plugin { asset: asset.to_string(), source })
    }

    /// Resolve an extra stage whose options live in `.<config_id>-config.toml`.
    pub fn stage(
        &self,
        asset: &str,
        plugin: &str,
        config_id: &str,
    ) -> Result<PluginHandle, SetupError> {
        let options = self.config(config_id)?;
        self.resolve(asset, plugin, &options)
    }
}

/// A category of source files sharing one transform/lint plugin pair.
pub trait AssetType {
    /// Type identifier. Names the tasks and the config file.
    fn id(&self) -> &str;

    /// Primary transform plugin name.
    fn compile_plugin(&self) -> &str;

    /// Lint plugin name.
    fn lint_plugin(&self) -> &str;

    /// Options the compile plugin gets unless the config file overrides them.
    fn compile_defaults(&self) -> AssetConfig {
        AssetConfig::default()
    }

    /// Options the lint plugin gets unless the `[lint]` table overrides them.
    fn lint_defaults(&self) -> AssetConfig {
        AssetConfig::default()
    }

    /// Stages run after the partial filter, before writing.
    fn extra_compile_stages(&self, _ctx: &SetupContext) -> Result<Vec<PluginHandle>, SetupError> {
        Ok(Vec::new())
    }

    /// Stages run after the lint plugin.
    fn extra_lint_stages(&self, _ctx: &SetupContext) -> Result<Vec<PluginHandle>, SetupError> {
        Ok(Vec::new())
    }
}

/// A resolved asset type bound to a source glob and a destination.
#[derive(Debug, Clone)]
pub struct AssetDescriptor {
    /// Type identifier (task name)
    pub id: String,
    /// Source glob, relative to the project root
    pub source_pattern: String,
    /// Destination directory, relative to the project root
    pub dest_path: PathBuf,
    /// Primary transform
    pub transform: PluginHandle,
    /// Lint plugin
    pub lint: PluginHandle,
    /// Config loaded from `.<id>-config.toml`
    pub config: AssetConfig,
    pub extra_compile_stages: Vec<PluginHandle>,
    pub extra_lint_stages: Vec<PluginHandle>,
}

impl AssetDescriptor {
    /// Build a descriptor, resolving every plugin up front.
    ///
    /// Top-level config keys go to the compile plugin; the `[lint]` table
    /// goes to the lint plugin.
    pub fn new(
        asset_type: &dyn AssetType,
        source_pattern: impl Into<String>,
        dest_path: impl Into<PathBuf>,
        ctx: &SetupContext,
    ) -> Result<Self, SetupError> {
        let id = asset_type.id().to_string();
        let config = ctx.config(&id)?;

        let mut compile_options = config.without(LINT_SECTION);
        compile_options.merge_defaults(&asset_type.compile_defaults());
        let mut lint_options = config.section(LINT_SECTION);
        lint_options.merge_defaults(&asset_type.lint_defaults());

        let transform = ctx.resolve(&id, asset_type.compile_plugin(), &compile_options)?;
        let lint = ctx.resolve(&id, asset_type.lint_plugin(), &lint_options)?;
        let extra_compile_stages = asset_type.extra_compile_stages(ctx)?;
        let extra_lint_stages = asset_type.extra_lint_stages(ctx)?;

        tracing::debug!(
            "Asset '{}': {} -> {} ({} extra compile, {} extra lint stages)",
            id,
            transform.name,
            lint.name,
            extra_compile_stages.len(),
            extra_lint_stages.len()
        );

        Ok(Self {
            id,
            source_pattern: source_pattern.into(),
            dest_path: dest_path.into(),
            transform,
            lint,
            config,
            extra_compile_stages,
            extra_lint_stages,
        })
    }

    /// Name of the compile task.
    pub fn compile_task(&self) -> &str {
        &self.id
    }

    /// Name of the lint task.
    pub fn lint_task(&self) -> String {
        format!("{}-lint", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Reporter, SourceFile, Stage, StageError};
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Alpha;

    impl AssetType for Alpha {
        fn id(&self) -> &str {
            "alpha"
        }

        fn compile_plugin(&self) -> &str {
            "recording"
        }

        fn lint_plugin(&self) -> &str {
            "whitespace-lint"
        }

        fn compile_defaults(&self) -> AssetConfig {
            AssetConfig::new().with("mode", "default").with("level", 1)
        }
    }

    struct Prefixed;

    impl AssetType for Prefixed {
        fn id(&self) -> &str {
            "prefixed"
        }

        fn compile_plugin(&self) -> &str {
            "copy"
        }

        fn lint_plugin(&self) -> &str {
            "copy"
        }

        fn extra_compile_stages(&self, ctx: &SetupContext) -> Result<Vec<PluginHandle>, SetupError> {
            Ok(vec![ctx.stage(self.id(), "autoprefixer", "autoprefixer")?])
        }
    }

    struct Missing;

    impl AssetType for Missing {
        fn id(&self) -> &str {
            "missing"
        }

        fn compile_plugin(&self) -> &str {
            "gulp-sass"
        }

        fn lint_plugin(&self) -> &str {
            "copy"
        }
    }

    struct Noop;

    impl Stage for Noop {
        fn name(&self) -> &str {
            "recording"
        }

        fn apply(&self, file: SourceFile, _: &Reporter) -> Result<Option<SourceFile>, StageError> {
            Ok(Some(file))
        }
    }

    fn recording_context(dir: &std::path::Path) -> (SetupContext, Arc<Mutex<Vec<AssetConfig>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut plugins = PluginRegistry::with_builtins();
        let sink = Arc::clone(&seen);
        plugins.register("recording", move |options: &AssetConfig| {
            sink.lock().unwrap().push(options.clone());
            Ok(Arc::new(Noop) as Arc<dyn Stage>)
        });
        (SetupContext::new(plugins, dir), seen)
    }

    #[test]
    fn test_descriptor_without_config() {
        let temp = TempDir::new().unwrap();
        let (ctx, seen) = recording_context(temp.path());

        let desc = AssetDescriptor::new(&Alpha, "a/**/*.x", "out/a", &ctx).unwrap();
        assert_eq!(desc.id, "alpha");
        assert_eq!(desc.transform.name, "recording");
        assert_eq!(desc.lint.name, "whitespace-lint");
        assert!(desc.config.is_empty());
        assert!(desc.extra_compile_stages.is_empty());
        assert!(desc.extra_lint_stages.is_empty());
        assert_eq!(desc.compile_task(), "alpha");
        assert_eq!(desc.lint_task(), "alpha-lint");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].get_str("mode"), Some("default"));
    }

    #[test]
    fn test_descriptor_config_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".alpha-config.toml"),
            "mode = \"custom\"\n\n[lint]\nstrict = true\n",
        )
        .unwrap();
        let (ctx, seen) = recording_context(temp.path());

        let desc = AssetDescriptor::new(&Alpha, "a/**/*.x", "out/a", &ctx).unwrap();
        assert_eq!(desc.config.section("lint").get_bool("strict"), Some(true));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].get_str("mode"), Some("custom"));
        assert_eq!(seen[0].get_u64("level"), Some(1));
        assert!(!seen[0].contains("lint"));
    }

    #[test]
    fn test_descriptor_malformed_config_is_fatal() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".alpha-config.toml"), "mode = [").unwrap();
        let (ctx, _) = recording_context(temp.path());

        let err = AssetDescriptor::new(&Alpha, "a/*.x", "out", &ctx).unwrap_err();
        assert!(matches!(err, SetupError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_descriptor_missing_plugin_is_fatal() {
        let temp = TempDir::new().unwrap();
        let ctx = SetupContext::new(PluginRegistry::with_builtins(), temp.path());

        let err = AssetDescriptor::new(&Missing, "a/*.x", "out", &ctx).unwrap_err();
        match err {
            SetupError::Plugin { asset, source } => {
                assert_eq!(asset, "missing");
                assert_eq!(source, PluginError::NotFound("gulp-sass".into()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_builtin_type_lookup() {
        for id in BUILTIN_TYPES {
            assert_eq!(builtin_type(id).map(|t| t.id().to_string()), Some(id.to_string()));
        }
        assert!(builtin_type("less").is_none());
        assert!(SetupError::UnknownAssetType("less".into()).to_string().contains("scss"));
    }

    #[test]
    fn test_extra_stage_reads_own_config() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".autoprefixer-config.toml"), "chrome = \"new\"").unwrap();
        let ctx = SetupContext::new(PluginRegistry::with_builtins(), temp.path());

        // The stage's own config is invalid, so building the descriptor fails.
        let err = AssetDescriptor::new(&Prefixed, "a/*.css", "out", &ctx).unwrap_err();
        assert!(matches!(err, SetupError::Plugin { source: PluginError::InvalidOptions { .. }, .. }));

        fs::write(temp.path().join(".autoprefixer-config.toml"), "chrome = 40").unwrap();
        let desc = AssetDescriptor::new(&Prefixed, "a/*.css", "out", &ctx).unwrap();
        assert_eq!(desc.extra_compile_stages.len(), 1);
        assert_eq!(desc.extra_compile_stages[0].name, "autoprefixer");
    }
}
