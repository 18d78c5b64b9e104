//! Logging setup using the `tracing` ecosystem.
//!
//! Log events go to stderr so task listings on stdout stay machine readable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither flags nor `RUST_LOG` say otherwise.
const DEFAULT_FILTER: &str = "assetpipe=info";

/// Build the level filter for the given flags.
///
/// Precedence: `verbose`, then `quiet`, then `RUST_LOG`, then info.
pub fn build_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("assetpipe=debug")
    } else if quiet {
        EnvFilter::new("assetpipe=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(verbose: bool, quiet: bool, no_color: bool) -> bool {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry().with(build_filter(verbose, quiet)).with(fmt_layer).try_init().is_ok()
}
