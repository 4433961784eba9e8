//! # authzd-server
//!
//! Process bootstrap for the authzd authorization server: TOML
//! configuration, logging setup, router assembly, and the serve loop.

pub mod app;
pub mod config;
pub mod idp;

pub use app::{ServerError, build_router, run};
pub use config::{Config, ConfigError, load_config};

/// Initializes the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(log_json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if log_json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
