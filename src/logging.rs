// ==========================================
// Logging initialization
// ==========================================
// tracing + tracing-subscriber, level controlled by RUST_LOG.
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the process-wide subscriber.
///
/// # Environment
/// - RUST_LOG: filter expression (default: info)
///   e.g. RUST_LOG=debug or RUST_LOG=composite_mes=trace
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Test-friendly initialization: debug level, capture-aware writer,
/// tolerant of repeated calls across test binaries.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
