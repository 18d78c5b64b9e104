//! Command-line interface implementation
//!
//! `assetpipe [TASK]...` loads the project, registers its tasks and invokes
//! the requested ones in order.

mod tasks;

use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::logging::init_logging;
use crate::project::DEFAULT_TASK;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// assetpipe - compile, lint and watch front-end assets
#[derive(Parser, Debug)]
#[command(name = "assetpipe")]
#[command(about = "Compile, lint and watch front-end assets with pluggable pipelines")]
#[command(version)]
pub struct Cli {
    /// Tasks to run, in order
    #[arg(value_name = "TASK", default_value = DEFAULT_TASK)]
    pub tasks: Vec<String>,

    /// Project directory (assetpipe.toml is searched upward from here)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Manifest file to use instead of searching for assetpipe.toml
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// List the registered tasks and exit
    #[arg(long)]
    pub list: bool,

    /// Files processed in parallel per pipeline
    #[arg(short, long)]
    pub jobs: Option<NonZeroUsize>,

    /// Keep watching sources after the tasks finish
    #[arg(short, long)]
    pub watch: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Run the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.no_color);
    tasks::run_tasks(&cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["assetpipe"]).unwrap();
        assert_eq!(cli.tasks, vec!["default"]);
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(cli.jobs.is_none());
        assert!(!cli.list);
    }

    #[test]
    fn test_tasks_and_flags() {
        let cli =
            Cli::try_parse_from(["assetpipe", "scss", "scss-lint", "-j", "4", "--no-color", "-v"])
                .unwrap();
        assert_eq!(cli.tasks, vec!["scss", "scss-lint"]);
        assert_eq!(cli.jobs.map(NonZeroUsize::get), Some(4));
        assert!(cli.no_color);
        assert!(cli.verbose);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(Cli::try_parse_from(["assetpipe", "-j", "0"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["assetpipe", "-v", "-q"]).is_err());
    }
}
