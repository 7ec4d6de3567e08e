//! # Logging Setup

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=till_settle=trace` - Show trace for the engine only
/// - Default: INFO, DEBUG for till crates, WARN for sqlx
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn"));

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .try_init();
}
