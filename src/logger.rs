//! Logging setup for binaries, benches and tests built on gif-residual
//!
//! The library itself only emits `tracing` events (rejected measurements,
//! unsupported resampling, failed Jacobian checks). Installing a subscriber is
//! left to the application; this module offers the standard one.

use tracing::Level;

/// Initialize the tracing subscriber with the standard configuration
///
/// Default log level: INFO (overrideable via RUST_LOG environment variable)
///
/// # Example
/// ```no_run
/// use gif_residual::init_logger;
///
/// fn main() {
///     init_logger();
///     tracing::info!("Filter started");
/// }
/// ```
///
/// # Environment Variables
/// ```bash
/// RUST_LOG=gif_residual=debug cargo test
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via RUST_LOG)
///
/// Calling this more than once is harmless: later calls leave the already
/// installed subscriber in place.
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}
