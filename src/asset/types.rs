//! Concrete asset types.

use super::{AssetType, SetupContext, SetupError};
use crate::config::{AssetConfig, AssetDecl, StageDecl};
use crate::plugin::{PluginHandle, EXEC_PREFIX};

/// Linters write findings to stdout; report them instead of replacing the file.
fn exec_lint_defaults() -> AssetConfig {
    AssetConfig::new().with("output", "report")
}

/// Sass stylesheets: compiled by `sass`, linted by `stylelint`, then
/// vendor-prefixed with options from `.autoprefixer-config.toml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scss;

impl AssetType for Scss {
    fn id(&self) -> &str {
        "scss"
    }

    fn compile_plugin(&self) -> &str {
        "exec:sass"
    }

    fn lint_plugin(&self) -> &str {
        "exec:stylelint"
    }

    fn compile_defaults(&self) -> AssetConfig {
        // Exec stages run in the source's directory, so "." finds sibling partials.
        AssetConfig::new().with("args", vec!["--stdin", "--load-path=."]).with("extension", "css")
    }

    fn lint_defaults(&self) -> AssetConfig {
        exec_lint_defaults().with("args", vec!["--stdin"])
    }

    fn extra_compile_stages(&self, ctx: &SetupContext) -> Result<Vec<PluginHandle>, SetupError> {
        Ok(vec![ctx.stage(self.id(), "autoprefixer", "autoprefixer")?])
    }
}

/// JavaScript: bundled by `esbuild`, linted by `eslint`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Js;

impl AssetType for Js {
    fn id(&self) -> &str {
        "js"
    }

    fn compile_plugin(&self) -> &str {
        "exec:esbuild"
    }

    fn lint_plugin(&self) -> &str {
        "exec:eslint"
    }

    fn lint_defaults(&self) -> AssetConfig {
        exec_lint_defaults().with("args", vec!["--stdin"])
    }
}

/// Plain CSS handled in-process by lightningcss.
#[derive(Debug, Clone, Copy, Default)]
pub struct Css;

impl AssetType for Css {
    fn id(&self) -> &str {
        "css"
    }

    fn compile_plugin(&self) -> &str {
        "css"
    }

    fn lint_plugin(&self) -> &str {
        "css-lint"
    }

    fn extra_compile_stages(&self, ctx: &SetupContext) -> Result<Vec<PluginHandle>, SetupError> {
        Ok(vec![ctx.stage(self.id(), "autoprefixer", "autoprefixer")?])
    }

    fn extra_lint_stages(&self, ctx: &SetupContext) -> Result<Vec<PluginHandle>, SetupError> {
        Ok(vec![ctx.resolve(self.id(), "whitespace-lint", &AssetConfig::default())?])
    }
}

/// JSON documents, minified on compile.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl AssetType for Json {
    fn id(&self) -> &str {
        "json"
    }

    fn compile_plugin(&self) -> &str {
        "json-minify"
    }

    fn lint_plugin(&self) -> &str {
        "json-lint"
    }
}

/// An asset type declared in `assetpipe.toml`.
#[derive(Debug, Clone)]
pub struct Declared {
    id: String,
    compile: String,
    lint: String,
    compile_stages: Vec<StageDecl>,
    lint_stages: Vec<StageDecl>,
}

impl Declared {
    /// Build from a manifest entry.
    ///
    /// Returns `None` when the entry names no plugins, meaning it refers to
    /// the built-in type with the same id.
    pub fn from_decl(id: impl Into<String>, decl: &AssetDecl) -> Option<Self> {
        Some(Self {
            id: id.into(),
            compile: decl.compile.clone()?,
            lint: decl.lint.clone()?,
            compile_stages: decl.compile_stages.clone(),
            lint_stages: decl.lint_stages.clone(),
        })
    }

    fn resolve_stages(
        &self,
        ctx: &SetupContext,
        stages: &[StageDecl],
    ) -> Result<Vec<PluginHandle>, SetupError> {
        stages.iter().map(|s| ctx.stage(&self.id, s.plugin(), &s.config_id())).collect()
    }
}

impl AssetType for Declared {
    fn id(&self) -> &str {
        &self.id
    }

    fn compile_plugin(&self) -> &str {
        &self.compile
    }

    fn lint_plugin(&self) -> &str {
        &self.lint
    }

    fn lint_defaults(&self) -> AssetConfig {
        if self.lint.starts_with(EXEC_PREFIX) {
            exec_lint_defaults()
        } else {
            AssetConfig::default()
        }
    }

    fn extra_compile_stages(&self, ctx: &SetupContext) -> Result<Vec<PluginHandle>, SetupError> {
        self.resolve_stages(ctx, &self.compile_stages)
    }

    fn extra_lint_stages(&self, ctx: &SetupContext) -> Result<Vec<PluginHandle>, SetupError> {
        self.resolve_stages(ctx, &self.lint_stages)
    }
}
