// sqldatabasetool/src/logging.rs
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` controls filtering, falling back to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // try_init: a second call (tests) must not panic
    let _ = fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
