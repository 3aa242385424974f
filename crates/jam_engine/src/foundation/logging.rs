//! Logging utilities
//!
//! The render core logs through the `log` facade: `trace!` for per-frame
//! detail, `debug!` for resource creation, `info!` for lifecycle events,
//! `warn!` for capacity and contract violations and `error!` for driver
//! failures.

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize the logging system
///
/// `default_level` applies until `RUST_LOG` says otherwise.
pub fn init(default_level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();
}

/// Initialize logging for tests, ignoring repeated initialization
pub fn init_for_tests() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .try_init();
}
