//! Built-in plugins.
//!
//! | Name | Kind | Behaviour |
//! | --- | --- | --- |
//! | `copy` | transform | passes files through unchanged |
//! | `json-minify` | transform | re-serialises JSON compactly (`pretty = true` to indent) |
//! | `json-lint` | lint | reports JSON syntax errors |
//! | `css` | transform | parses and prints CSS with lightningcss (`minify = true`) |
//! | `css-lint` | lint | reports CSS syntax errors |
//! | `autoprefixer` | transform | adds vendor prefixes for the configured browsers |
//! | `whitespace-lint` | lint | reports trailing whitespace |
//! | `exec:<program>` | either | pipes the file through an external program (`output = "report"` for linters) |

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use super::registry::{PluginError, PluginRegistry};
use super::stage::{Reporter, SourceFile, Stage, StageError};
use crate::config::AssetConfig;

/// Register every built-in plugin.
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register_stage("copy", Arc::new(CopyStage));
    registry.register("json-minify", |options: &AssetConfig| {
        Ok(Arc::new(JsonMinify { pretty: options.get_bool("pretty").unwrap_or(false) })
            as Arc<dyn Stage>)
    });
    registry.register_stage("json-lint", Arc::new(JsonLint));
    registry.register("css", |options: &AssetConfig| {
        Ok(Arc::new(CssStage::new("css", options.get_bool("minify").unwrap_or(false), None))
            as Arc<dyn Stage>)
    });
    registry.register_stage("css-lint", Arc::new(CssLint));
    registry.register("autoprefixer", |options: &AssetConfig| {
        let browsers = browsers_from_options(options)?;
        let minify = options.get_bool("minify").unwrap_or(false);
        Ok(Arc::new(CssStage::new("autoprefixer", minify, Some(browsers))) as Arc<dyn Stage>)
    });
    registry.register_stage("whitespace-lint", Arc::new(WhitespaceLint));
}

/// Passthrough stage.
pub struct CopyStage;

impl Stage for CopyStage {
    fn name(&self) -> &str {
        "copy"
    }

    fn apply(&self, file: SourceFile, _: &Reporter) -> Result<Option<SourceFile>, StageError> {
        Ok(Some(file))
    }
}

/// Re-serialise JSON documents.
pub struct JsonMinify {
    pretty: bool,
}

impl Stage for JsonMinify {
    fn name(&self) -> &str {
        "json-minify"
    }

    fn apply(&self, file: SourceFile, _: &Reporter) -> Result<Option<SourceFile>, StageError> {
        let value: serde_json::Value = serde_json::from_slice(&file.contents)
            .map_err(|e| StageError::at_line(e.to_string(), e.line()))?;
        let output = if self.pretty {
            serde_json::to_vec_pretty(&value)
        } else {
            serde_json::to_vec(&value)
        }
        .map_err(|e| StageError::new(e.to_string()))?;
        Ok(Some(file.with_contents(output)))
    }
}

/// Report JSON syntax errors without changing the file.
pub struct JsonLint;

impl Stage for JsonLint {
    fn name(&self) -> &str {
        "json-lint"
    }

    fn apply(&self, file: SourceFile, reporter: &Reporter) -> Result<Option<SourceFile>, StageError> {
        if let Err(e) = serde_json::from_slice::<serde_json::Value>(&file.contents) {
            reporter.warn(&file.path, self.name(), Some(e.line()), e.to_string());
        }
        Ok(Some(file))
    }
}

/// lightningcss-backed CSS stage, optionally with browser targets.
pub struct CssStage {
    name: String,
    minify: bool,
    targets: Targets,
}

impl CssStage {
    pub fn new(name: &str, minify: bool, browsers: Option<Browsers>) -> Self {
        let targets = browsers.map(Targets::from).unwrap_or_default();
        Self { name: name.to_string(), minify, targets }
    }
}

impl Stage for CssStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, file: SourceFile, _: &Reporter) -> Result<Option<SourceFile>, StageError> {
        let source = file.text()?;
        let code = process_css(&file, source, self.minify, self.targets)?;
        Ok(Some(file.with_contents(code)))
    }
}

fn process_css(
    file: &SourceFile,
    source: &str,
    minify: bool,
    targets: Targets,
) -> Result<String, StageError> {
    let options = ParserOptions {
        filename: file.path.to_string_lossy().into_owned(),
        ..Default::default()
    };
    let mut stylesheet = StyleSheet::parse(source, options).map_err(|e| {
        let line = e.loc.as_ref().map(|loc| loc.line as usize + 1);
        StageError { message: e.kind.to_string(), line }
    })?;

    stylesheet
        .minify(MinifyOptions { targets, ..Default::default() })
        .map_err(|e| StageError::new(e.to_string()))?;

    let result = stylesheet
        .to_css(PrinterOptions { minify, targets, ..Default::default() })
        .map_err(|e| StageError::new(e.to_string()))?;

    Ok(result.code)
}

/// Report CSS syntax errors without changing the file.
pub struct CssLint;

impl Stage for CssLint {
    fn name(&self) -> &str {
        "css-lint"
    }

    fn apply(&self, file: SourceFile, reporter: &Reporter) -> Result<Option<SourceFile>, StageError> {
        let source = file.text()?;
        let options = ParserOptions {
            filename: file.path.to_string_lossy().into_owned(),
            ..Default::default()
        };
        if let Err(e) = StyleSheet::parse(source, options) {
            let line = e.loc.as_ref().map(|loc| loc.line as usize + 1);
            reporter.warn(&file.path, self.name(), line, e.kind.to_string());
        }
        Ok(Some(file))
    }
}

/// Build lightningcss browser targets from major versions in the options.
///
/// Keys: `android`, `chrome`, `edge`, `firefox`, `ie`, `ios_saf`, `opera`,
/// `safari`, `samsung`.
pub fn browsers_from_options(options: &AssetConfig) -> Result<Browsers, PluginError> {
    let mut browsers = Browsers::default();
    let slots: [(&str, &mut Option<u32>); 9] = [
        ("android", &mut browsers.android),
        ("chrome", &mut browsers.chrome),
        ("edge", &mut browsers.edge),
        ("firefox", &mut browsers.firefox),
        ("ie", &mut browsers.ie),
        ("ios_saf", &mut browsers.ios_saf),
        ("opera", &mut browsers.opera),
        ("safari", &mut browsers.safari),
        ("samsung", &mut browsers.samsung),
    ];

    for (key, slot) in slots {
        let Some(value) = options.get(key) else { continue };
        let major = value
            .as_u64()
            .filter(|v| *v <= u8::MAX as u64)
            .ok_or_else(|| PluginError::InvalidOptions {
                plugin: "autoprefixer".to_string(),
                message: format!("'{}' must be a major version number", key),
            })?;
        // lightningcss encodes versions as major << 16 | minor << 8 | patch
        *slot = Some((major as u32) << 16);
    }

    Ok(browsers)
}

/// Report lines ending in spaces or tabs.
pub struct WhitespaceLint;

impl Stage for WhitespaceLint {
    fn name(&self) -> &str {
        "whitespace-lint"
    }

    fn apply(&self, file: SourceFile, reporter: &Reporter) -> Result<Option<SourceFile>, StageError> {
        let text = file.text()?;
        for (index, line) in text.lines().enumerate() {
            if line.ends_with(' ') || line.ends_with('\t') {
                reporter.warn(&file.path, self.name(), Some(index + 1), "trailing whitespace");
            }
        }
        Ok(Some(file))
    }
}

/// What an exec stage does with the program's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutput {
    /// Stdout replaces the file contents (transforms)
    Replace,
    /// Stdout is reported as a warning and the file passes through (linters)
    Report,
}

/// Pipes file contents through an external program.
///
/// The program runs in the source file's directory so relative imports
/// resolve, and receives the file on stdin. A non-zero exit status fails
/// the file with the program's stderr and stdout as the message.
pub struct ExecStage {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    extension: Option<String>,
    output: ExecOutput,
}

impl ExecStage {
    /// Build an exec stage from plugin options (`args`, `extension`,
    /// `output = "replace" | "report"`).
    pub fn from_options(
        name: &str,
        program: PathBuf,
        options: &AssetConfig,
    ) -> Result<Self, PluginError> {
        let invalid = |message: &str| PluginError::InvalidOptions {
            plugin: name.to_string(),
            message: message.to_string(),
        };

        let args = match options.get("args") {
            None => Vec::new(),
            Some(value) if value.is_array() => options.get_str_list("args").unwrap_or_default(),
            Some(_) => return Err(invalid("'args' must be a list of strings")),
        };
        let output = match options.get_str("output") {
            None | Some("replace") => ExecOutput::Replace,
            Some("report") => ExecOutput::Report,
            Some(_) => return Err(invalid("'output' must be \"replace\" or \"report\"")),
        };
        let extension = options.get_str("extension").map(str::to_string);
        Ok(Self { name: name.to_string(), program, args, extension, output })
    }
}

impl Stage for ExecStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, file: SourceFile, reporter: &Reporter) -> Result<Option<SourceFile>, StageError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = file.path.parent().filter(|d| d.is_dir()) {
            command.current_dir(dir);
        }
        let mut child = command
            .spawn()
            .map_err(|e| StageError::new(format!("failed to start {}: {}", self.name, e)))?;

        // Feed stdin from a separate thread so a chatty program cannot
        // deadlock on a full stdout pipe.
        let stdin = child.stdin.take();
        let input = file.contents.clone();
        let writer = std::thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(&input);
            }
        });

        let output = child
            .wait_with_output()
            .map_err(|e| StageError::new(format!("{} failed: {}", self.name, e)))?;
        let _ = writer.join();

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = [stderr.trim(), stdout.trim()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if message.is_empty() {
                return Err(StageError::new(format!("{} exited with {}", self.name, output.status)));
            }
            return Err(StageError::new(message));
        }

        let mut file = match self.output {
            ExecOutput::Replace => file.with_contents(output.stdout),
            ExecOutput::Report => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let findings = stdout.trim();
                if !findings.is_empty() {
                    reporter.warn(&file.path, &self.name, None, findings);
                }
                file
            }
        };
        if let Some(ext) = &self.extension {
            file = file.with_extension(ext);
        }
        Ok(Some(file))
    }
}
