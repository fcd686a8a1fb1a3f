mod tests_flush_marker;

use tracing_subscriber::EnvFilter;

/// Initialize tracing controlled by `RUST_LOG`; only the first call wins.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
