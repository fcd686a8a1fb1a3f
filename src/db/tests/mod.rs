mod tests_config;

use crate::db::DbConfig;
use tracing_subscriber::EnvFilter;

/// Initialize tracing controlled by `RUST_LOG`; only the first call wins.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config that never rotates: everything stays in the active memtable.
pub(crate) fn memtable_only_config() -> DbConfig {
    init_tracing();
    DbConfig {
        max_entries: usize::MAX,
        ..DbConfig::default()
    }
}

/// Config that rotates every handful of writes, exercising the flush path.
pub(crate) fn tiny_buffer_config() -> DbConfig {
    init_tracing();
    DbConfig {
        max_entries: 16,
        block_size: 128,
        ..DbConfig::default()
    }
}
