//! assetpipe - command-line task runner for asset pipelines

use std::process::ExitCode;

use assetpipe::cli;

fn main() -> ExitCode {
    cli::run()
}
