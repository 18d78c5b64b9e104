//! Source file discovery.
//!
//! Matches source globs against the file system and derives the glob base
//! that decides where matched files land under a destination.

use std::path::{Component, Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Check whether a path component contains glob metacharacters.
fn is_glob_component(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Drop `.` components so `./src/*.x` and `src/*.x` match the same paths.
fn strip_cur_dir(pattern: &str) -> String {
    let stripped: Vec<&str> = pattern.split('/').filter(|part| *part != ".").collect();
    match stripped.as_slice() {
        [] => ".".to_string(),
        parts => parts.join("/"),
    }
}

/// Leading directory of a glob: every component before the first one
/// containing a metacharacter.
///
/// `sources/scss/**/*.scss` has base `sources/scss`; a pattern without
/// metacharacters has its parent directory as base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = strip_cur_dir(pattern);
    let path = Path::new(&pattern);
    let mut base = PathBuf::new();
    let mut has_glob = false;

    for component in path.components() {
        if let Component::Normal(part) = component {
            if is_glob_component(&part.to_string_lossy()) {
                has_glob = true;
                break;
            }
        }
        base.push(component.as_os_str());
    }

    if !has_glob {
        base.pop();
    }
    base
}

/// Anchor a pattern at the project root.
///
/// The root is escaped so directories with metacharacters in their names
/// still match literally.
pub fn anchored_pattern(root: &Path, pattern: &str) -> String {
    let pattern = strip_cur_dir(pattern);
    if Path::new(&pattern).is_absolute() {
        return pattern;
    }
    let root = Pattern::escape(&root.to_string_lossy());
    if root.is_empty() {
        pattern
    } else {
        format!("{}/{}", root.trim_end_matches('/'), pattern)
    }
}

/// Absolute glob base for a pattern under `root`.
pub fn source_base(root: &Path, pattern: &str) -> PathBuf {
    root.join(glob_base(pattern))
}

/// Lazily iterate the regular files matching `pattern` under `root`.
///
/// Unreadable entries are logged and skipped.
pub fn match_sources(
    root: &Path,
    pattern: &str,
) -> Result<impl Iterator<Item = PathBuf>, DiscoveryError> {
    let full = anchored_pattern(root, pattern);
    let options = MatchOptions { require_literal_leading_dot: true, ..MatchOptions::new() };
    let paths = glob_with(&full, options).map_err(|source| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    Ok(paths.filter_map(|entry| match entry {
        Ok(path) if path.is_file() => Some(path),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Error reading path: {}", e);
            None
        }
    }))
}

/// Compile a pattern for matching changed paths.
pub fn compile_pattern(root: &Path, pattern: &str) -> Result<Pattern, DiscoveryError> {
    Pattern::new(&anchored_pattern(root, pattern)).map_err(|source| {
        DiscoveryError::InvalidPattern { pattern: pattern.to_string(), source }
    })
}

/// Partials are files whose name starts with `_`; they are compiled into
/// other files and never written on their own.
pub fn is_partial(path: &Path) -> bool {
    path.file_name().map(|n| n.to_string_lossy().starts_with('_')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_files(dir: &Path, files: &[&str]) {
        for file in files {
            let path = dir.join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, "x").unwrap();
        }
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("sources/scss/**/*.scss"), PathBuf::from("sources/scss"));
        assert_eq!(glob_base("src/a/*.x"), PathBuf::from("src/a"));
        assert_eq!(glob_base("*.json"), PathBuf::new());
        assert_eq!(glob_base("src/{a,b}/*.js"), PathBuf::from("src"));
        assert_eq!(glob_base("src/site.css"), PathBuf::from("src"));
        assert_eq!(glob_base("./sources/js/**/*.js"), PathBuf::from("sources/js"));
        assert_eq!(glob_base("./sources/./js/app.js"), PathBuf::from("sources/js"));
    }

    #[test]
    fn test_match_sources() {
        let temp = TempDir::new().unwrap();
        create_test_files(
            temp.path(),
            &["src/a/one.x", "src/a/two.x", "src/a/sub/three.x", "src/a/skip.y", "src/b/four.x"],
        );

        let files: Vec<_> = match_sources(temp.path(), "src/a/**/*.x").unwrap().collect();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.extension().unwrap() == "x"));
        assert!(files.iter().all(|f| f.starts_with(temp.path().join("src/a"))));
    }

    #[test]
    fn test_match_sources_skips_directories() {
        let temp = TempDir::new().unwrap();
        create_test_files(temp.path(), &["src/dir.x/inner.txt", "src/file.x"]);

        let files: Vec<_> = match_sources(temp.path(), "src/*.x").unwrap().collect();
        assert_eq!(files, vec![temp.path().join("src/file.x")]);
    }

    #[test]
    fn test_match_sources_empty() {
        let temp = TempDir::new().unwrap();
        let files: Vec<_> = match_sources(temp.path(), "nothing/**/*.x").unwrap().collect();
        assert!(files.is_empty());
    }

    #[test]
    fn test_match_sources_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let err = match_sources(temp.path(), "src/[unclosed").err().unwrap();
        assert!(err.to_string().contains("src/[unclosed"));
    }

    #[test]
    fn test_compile_pattern_matches_changed_path() {
        let root = Path::new("/project");
        let pattern = compile_pattern(root, "sources/scss/**/*.scss").unwrap();
        assert!(pattern.matches_path(Path::new("/project/sources/scss/site.scss")));
        assert!(pattern.matches_path(Path::new("/project/sources/scss/deep/_vars.scss")));
        assert!(!pattern.matches_path(Path::new("/project/sources/js/app.js")));
    }

    #[test]
    fn test_cur_dir_components_ignored() {
        let root = Path::new("/project");
        assert_eq!(anchored_pattern(root, "./sources/js/**/*.js"), "/project/sources/js/**/*.js");

        let pattern = compile_pattern(root, "./sources/js/**/*.js").unwrap();
        assert!(pattern.matches_path(Path::new("/project/sources/js/app.js")));
        assert_eq!(source_base(root, "./sources/js/**/*.js"), PathBuf::from("/project/sources/js"));
    }

    #[test]
    fn test_match_sources_with_cur_dir_prefix() {
        let temp = TempDir::new().unwrap();
        create_test_files(temp.path(), &["sources/js/app.js"]);

        let files: Vec<_> = match_sources(temp.path(), "./sources/js/**/*.js").unwrap().collect();
        assert_eq!(files, vec![temp.path().join("sources/js/app.js")]);
    }

    #[test]
    fn test_is_partial() {
        assert!(is_partial(Path::new("sources/scss/_variables.scss")));
        assert!(!is_partial(Path::new("sources/scss/site.scss")));
        assert!(!is_partial(Path::new("_dir/site.scss")));
    }
}
