//! Configuration schema types.
//!
//! Two kinds of configuration exist:
//! - [`AssetConfig`]: free-form options for one asset type, read from
//!   `.<type-id>-config.toml` and handed to its plugins
//! - [`Manifest`]: the optional `assetpipe.toml` project file declaring
//!   asset types and watch settings

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Name of the table inside an asset config that holds lint plugin options.
pub const LINT_SECTION: &str = "lint";

/// Options for one asset type (arbitrary keys to values).
///
/// An empty mapping is the valid "no configuration" state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetConfig {
    values: Map<String, Value>,
}

impl AssetConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, returning the updated config.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    /// Get a list of strings. Non-string entries are skipped.
    pub fn get_str_list(&self, key: &str) -> Option<Vec<String>> {
        let items = self.values.get(key)?.as_array()?;
        Some(items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
    }

    /// Get a nested table as its own config (empty if absent or not a table).
    pub fn section(&self, key: &str) -> AssetConfig {
        match self.values.get(key) {
            Some(Value::Object(map)) => AssetConfig { values: map.clone() },
            _ => AssetConfig::default(),
        }
    }

    /// Copy of this config without the given key.
    pub fn without(&self, key: &str) -> AssetConfig {
        let mut values = self.values.clone();
        values.remove(key);
        AssetConfig { values }
    }

    /// Fill in keys missing from this config with the given defaults.
    ///
    /// Values already present win over defaults.
    pub fn merge_defaults(&mut self, defaults: &AssetConfig) {
        for (key, value) in &defaults.values {
            self.values.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for AssetConfig {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// An extra pipeline stage declared in the manifest.
///
/// Either a bare plugin name or a table naming the config file to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageDecl {
    /// `"exec:postcss"` - options come from `.postcss-config.toml`
    Name(String),
    /// `{ plugin = "autoprefixer", config = "browsers" }`
    Detailed {
        plugin: String,
        #[serde(default)]
        config: Option<String>,
    },
}

impl StageDecl {
    /// Plugin name to resolve.
    pub fn plugin(&self) -> &str {
        match self {
            StageDecl::Name(name) => name,
            StageDecl::Detailed { plugin, .. } => plugin,
        }
    }

    /// Identifier used to locate the stage's config file.
    ///
    /// Defaults to the plugin name with any `exec:` prefix stripped.
    pub fn config_id(&self) -> String {
        match self {
            StageDecl::Detailed { config: Some(config), .. } => config.clone(),
            _ => {
                let plugin = self.plugin();
                plugin.strip_prefix("exec:").unwrap_or(plugin).to_string()
            }
        }
    }
}

/// An asset type declared in `assetpipe.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDecl {
    /// Source glob, relative to the project root
    pub src: String,
    /// Destination directory, relative to the project root
    pub dest: String,
    /// Primary transform plugin; omit with `lint` to use the built-in type named by the id
    #[serde(default)]
    pub compile: Option<String>,
    /// Lint plugin
    #[serde(default)]
    pub lint: Option<String>,
    /// Extra stages applied after the partial filter
    #[serde(default)]
    pub compile_stages: Vec<StageDecl>,
    /// Extra stages applied after the lint plugin
    #[serde(default)]
    pub lint_stages: Vec<StageDecl>,
}

/// Watch mode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Complete `assetpipe.toml` manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Directory holding `.<id>-config.toml` files, relative to the project root
    #[serde(default)]
    pub config_dir: Option<String>,
    /// Parallel file workers per pipeline (1 = sequential streaming)
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Declared asset types, keyed by type id
    #[serde(default)]
    pub assets: BTreeMap<String, AssetDecl>,
}

/// Manifest validation error
#[derive(Debug, Clone)]
pub struct ManifestValidationError {
    /// Path to the invalid field (e.g., "assets.scss.src")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ManifestValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetpipe.toml: '{}' {}", self.field, self.message)
    }
}

/// Task names the orchestrator reserves for aggregate tasks.
pub const RESERVED_TASK_NAMES: [&str; 3] = ["compile", "lints", "default"];

impl Manifest {
    /// Validate the manifest and return all errors found.
    pub fn validate(&self) -> Vec<ManifestValidationError> {
        let mut errors = Vec::new();

        if self.jobs == Some(0) {
            errors.push(ManifestValidationError {
                field: "jobs".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        for (id, asset) in &self.assets {
            if !is_valid_type_id(id) {
                errors.push(ManifestValidationError {
                    field: format!("assets.{}", id),
                    message: "id must use lowercase letters, digits, '_' or '-'".to_string(),
                });
            }
            if RESERVED_TASK_NAMES.contains(&id.as_str()) || id.ends_with("-lint") {
                errors.push(ManifestValidationError {
                    field: format!("assets.{}", id),
                    message: "id collides with a generated task name".to_string(),
                });
            }

            let required = [
                ("src", Some(&asset.src)),
                ("dest", Some(&asset.dest)),
                ("compile", asset.compile.as_ref()),
                ("lint", asset.lint.as_ref()),
            ];
            for (field, value) in required {
                if value.is_some_and(|v| v.trim().is_empty()) {
                    errors.push(ManifestValidationError {
                        field: format!("assets.{}.{}", id, field),
                        message: "must be a non-empty string".to_string(),
                    });
                }
            }

            if asset.compile.is_some() != asset.lint.is_some() {
                errors.push(ManifestValidationError {
                    field: format!("assets.{}", id),
                    message: "'compile' and 'lint' must be declared together".to_string(),
                });
            } else if asset.compile.is_none()
                && !(asset.compile_stages.is_empty() && asset.lint_stages.is_empty())
            {
                errors.push(ManifestValidationError {
                    field: format!("assets.{}", id),
                    message: "extra stages require 'compile' and 'lint'".to_string(),
                });
            }
        }

        errors
    }
}

/// Check whether a string is usable as an asset type id.
pub fn is_valid_type_id(id: &str) -> bool {
    !id.is_empty()
        && id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(src: &str) -> AssetDecl {
        AssetDecl {
            src: src.to_string(),
            dest: "out".to_string(),
            compile: Some("copy".to_string()),
            lint: Some("whitespace-lint".to_string()),
            compile_stages: vec![],
            lint_stages: vec![],
        }
    }

    #[test]
    fn test_asset_config_getters() {
        let config = AssetConfig::new()
            .with("minify", true)
            .with("extension", "css")
            .with("depth", 3)
            .with("args", serde_json::json!(["--stdin", 4, "--quiet"]));

        assert_eq!(config.get_bool("minify"), Some(true));
        assert_eq!(config.get_str("extension"), Some("css"));
        assert_eq!(config.get_u64("depth"), Some(3));
        assert_eq!(config.get_str_list("args"), Some(vec!["--stdin".into(), "--quiet".into()]));
        assert_eq!(config.get_str("missing"), None);
    }

    #[test]
    fn test_asset_config_section_and_without() {
        let config = AssetConfig::new()
            .with("minify", true)
            .with(LINT_SECTION, serde_json::json!({ "strict": true }));

        assert_eq!(config.section(LINT_SECTION).get_bool("strict"), Some(true));
        assert!(config.section("absent").is_empty());

        let compile = config.without(LINT_SECTION);
        assert!(!compile.contains(LINT_SECTION));
        assert_eq!(compile.len(), 1);
    }

    #[test]
    fn test_asset_config_merge_defaults_keeps_existing() {
        let mut config = AssetConfig::new().with("extension", "min.css");
        let defaults = AssetConfig::new().with("extension", "css").with("args", "x");
        config.merge_defaults(&defaults);

        assert_eq!(config.get_str("extension"), Some("min.css"));
        assert_eq!(config.get_str("args"), Some("x"));
    }

    #[test]
    fn test_stage_decl_config_id() {
        assert_eq!(StageDecl::Name("exec:postcss".into()).config_id(), "postcss");
        assert_eq!(StageDecl::Name("autoprefixer".into()).config_id(), "autoprefixer");

        let detailed = StageDecl::Detailed {
            plugin: "autoprefixer".into(),
            config: Some("browsers".into()),
        };
        assert_eq!(detailed.plugin(), "autoprefixer");
        assert_eq!(detailed.config_id(), "browsers");
    }

    #[test]
    fn test_manifest_parse() {
        let manifest: Manifest = toml::from_str(
            r#"
jobs = 2

[watch]
debounce_ms = 250

[assets.scss]
src = "sources/scss/**/*.scss"
dest = "css"
compile = "exec:sass"
lint = "exec:stylelint"
compile_stages = ["autoprefixer", { plugin = "css", config = "minify" }]
"#,
        )
        .unwrap();

        assert_eq!(manifest.jobs, Some(2));
        assert_eq!(manifest.watch.debounce_ms, 250);
        let scss = &manifest.assets["scss"];
        assert_eq!(scss.compile_stages.len(), 2);
        assert_eq!(scss.compile_stages[1].config_id(), "minify");
        assert!(scss.lint_stages.is_empty());
    }

    #[test]
    fn test_watch_config_default() {
        assert_eq!(WatchConfig::default().debounce_ms, 100);
    }

    #[test]
    fn test_validate_ok() {
        let mut manifest = Manifest::default();
        manifest.assets.insert("scss".into(), decl("a/**/*.scss"));
        assert!(manifest.validate().is_empty());
    }

    #[test]
    fn test_validate_reserved_and_empty_fields() {
        let mut manifest = Manifest::default();
        manifest.assets.insert("compile".into(), decl("a/*.x"));
        manifest.assets.insert("beta".into(), decl(""));
        manifest.jobs = Some(0);

        let errors = manifest.validate();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"jobs"));
        assert!(fields.contains(&"assets.compile"));
        assert!(fields.contains(&"assets.beta.src"));
    }

    #[test]
    fn test_validate_builtin_reference() {
        let mut manifest = Manifest::default();
        let mut builtin = decl("sources/js/**/*.js");
        builtin.compile = None;
        builtin.lint = None;
        manifest.assets.insert("js".into(), builtin.clone());
        assert!(manifest.validate().is_empty());

        builtin.lint = Some("exec:eslint".into());
        manifest.assets.insert("js".into(), builtin.clone());
        assert_eq!(manifest.validate().len(), 1);

        builtin.lint = None;
        builtin.compile_stages.push(StageDecl::Name("copy".into()));
        manifest.assets.insert("js".into(), builtin);
        assert!(manifest.validate()[0].message.contains("extra stages"));
    }

    #[test]
    fn test_is_valid_type_id() {
        assert!(is_valid_type_id("scss"));
        assert!(is_valid_type_id("js-modules_2"));
        assert!(!is_valid_type_id("Scss"));
        assert!(!is_valid_type_id(""));
        assert!(!is_valid_type_id("a b"));
    }
}
