pub mod config;
pub mod database;
pub mod error;
pub mod identity;
pub mod permission;
pub mod registry;
pub mod services;
pub mod types;

pub use error::CoreError;

/// Initialize tracing with the conventional env-filter setup. Safe to call
/// more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
