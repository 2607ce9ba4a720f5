//! Tracing subscriber setup for the `convoy` binary.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive for convoy.
pub const LOG_ENV_VAR: &str = "CONVOY_LOG";

/// Install the global fmt subscriber.
///
/// Filter precedence: `--verbose` forces `debug`, otherwise `CONVOY_LOG`,
/// then `RUST_LOG`, then `info`. Logs go to stderr so `--json` output stays
/// clean on stdout. Calling this twice is harmless.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
