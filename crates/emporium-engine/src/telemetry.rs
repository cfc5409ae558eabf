//! # Telemetry
//!
//! Structured logging setup.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - every repository call
//! - `RUST_LOG=emporium_engine=trace` - engine internals only
//! - Default: `info` for completed business operations, `debug` for the
//!   emporium crates, `warn` for sqlx

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,emporium_core=debug,emporium_db=debug,emporium_engine=debug,sqlx=warn";

/// Installs the global `fmt` subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
