//! Logging setup shared by the binaries

use tracing_subscriber::EnvFilter;

/// Initialize tracing with `RUST_LOG`, falling back to `default_filter`
///
/// The client tools pass `to_stderr` so their stdout carries only chat
/// output.
pub fn init(default_filter: &str, to_stderr: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}
