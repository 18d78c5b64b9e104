//! Configuration loading and discovery.
//!
//! Provides functions to load per-asset-type option files and to find and
//! load the `assetpipe.toml` project manifest.

use super::schema::{AssetConfig, Manifest};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the project manifest.
pub const MANIFEST_FILE: &str = "assetpipe.toml";

/// Extensions tried, in order, when locating an asset type's config file.
const CONFIG_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// TOML parsing error
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// JSON parsing error
    #[error("Failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// Path of the config file for an asset type.
///
/// The file is named after the lower-cased type id: `scss` maps to
/// `<dir>/.scss-config.toml`. A `.json` file is used when it exists and the
/// `.toml` one does not.
pub fn config_path_for(dir: &Path, type_id: &str) -> PathBuf {
    let stem = format!(".{}-config", type_id.to_lowercase());
    for ext in CONFIG_EXTENSIONS {
        let candidate = dir.join(format!("{}.{}", stem, ext));
        if candidate.exists() {
            return candidate;
        }
    }
    dir.join(format!("{}.{}", stem, CONFIG_EXTENSIONS[0]))
}

/// Load an asset config file.
///
/// A missing file yields an empty config. An existing file that cannot be
/// parsed is an error.
pub fn load(path: &Path) -> Result<AssetConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using empty options", path.display());
        return Ok(AssetConfig::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?,
        _ => toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?,
    };

    tracing::debug!("Loaded config {}", path.display());
    Ok(config)
}

/// Load the config for an asset type from `dir`.
pub fn load_asset_config(dir: &Path, type_id: &str) -> Result<AssetConfig, ConfigError> {
    load(&config_path_for(dir, type_id))
}

/// Find `assetpipe.toml` by walking up from a directory.
pub fn find_manifest_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let manifest_path = current.join(MANIFEST_FILE);
        if manifest_path.exists() {
            return Some(manifest_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<Manifest, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let manifest: Manifest = toml::from_str(&contents)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

    let errors = manifest.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(manifest)
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageDecl;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        File::create(path)
            .expect("should create file")
            .write_all(contents.as_bytes())
            .expect("should write file");
    }

    #[test]
    fn test_config_path_for_lowercases_id() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = config_path_for(temp.path(), "Scss");
        assert_eq!(path, temp.path().join(".scss-config.toml"));
    }

    #[test]
    fn test_config_path_for_prefers_existing_json() {
        let temp = TempDir::new().expect("should create temp dir");
        write(&temp.path().join(".js-config.json"), "{}");

        assert_eq!(config_path_for(temp.path(), "js"), temp.path().join(".js-config.json"));

        write(&temp.path().join(".js-config.toml"), "");
        assert_eq!(config_path_for(temp.path(), "js"), temp.path().join(".js-config.toml"));
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().expect("should create temp dir");
        let config = load(&temp.path().join(".nothing-config.toml")).expect("should not fail");
        assert!(config.is_empty());
    }

    #[test]
    fn test_load_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = temp.path().join(".scss-config.toml");
        write(
            &path,
            r#"
args = ["--stdin", "--style=compressed"]
extension = "css"

[lint]
strict = true
"#,
        );

        let config = load(&path).expect("should load valid config");
        assert_eq!(config.get_str("extension"), Some("css"));
        assert_eq!(config.get_str_list("args").map(|a| a.len()), Some(2));
        assert_eq!(config.section("lint").get_bool("strict"), Some(true));
    }

    #[test]
    fn test_load_json() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = temp.path().join(".json-config.json");
        write(&path, r#"{ "pretty": true }"#);

        let config = load(&path).expect("should load valid config");
        assert_eq!(config.get_bool("pretty"), Some(true));
    }

    #[test]
    fn test_load_malformed_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = temp.path().join(".scss-config.toml");
        write(&path, "this is not valid toml {{{");

        let result = load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_malformed_json() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = temp.path().join(".js-config.json");
        write(&path, "{ nope");

        assert!(matches!(load(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn test_load_asset_config() {
        let temp = TempDir::new().expect("should create temp dir");
        write(&temp.path().join(".alpha-config.toml"), "minify = true");

        let config = load_asset_config(temp.path(), "alpha").expect("should load");
        assert_eq!(config.get_bool("minify"), Some(true));
        assert!(load_asset_config(temp.path(), "beta").expect("should load").is_empty());
    }

    #[test]
    fn test_find_manifest_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let manifest_path = temp.path().join(MANIFEST_FILE);
        write(&manifest_path, "");

        let subdir = temp.path().join("sources").join("scss");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        assert_eq!(find_manifest_from(subdir), Some(manifest_path));
    }

    #[test]
    fn test_find_manifest_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(find_manifest_from(temp.path().to_path_buf()), None);
    }

    #[test]
    fn test_load_manifest() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = temp.path().join(MANIFEST_FILE);
        write(
            &path,
            r#"
[assets.styles]
src = "styles/**/*.css"
dest = "public/css"
compile = "css"
lint = "css-lint"
compile_stages = ["autoprefixer"]
"#,
        );

        let manifest = load_manifest(&path).expect("should load manifest");
        let styles = &manifest.assets["styles"];
        assert_eq!(styles.dest, "public/css");
        assert_eq!(styles.compile_stages, vec![StageDecl::Name("autoprefixer".into())]);
    }

    #[test]
    fn test_load_manifest_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = temp.path().join(MANIFEST_FILE);
        write(
            &path,
            r#"
[assets.lints]
src = ""
dest = "x"
compile = "copy"
lint = "copy"
"#,
        );

        assert!(matches!(load_manifest(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, Path::new("/other")), PathBuf::from("/other"));
        assert_eq!(resolve_path(root, Path::new("css")), PathBuf::from("/project/css"));
    }
}
