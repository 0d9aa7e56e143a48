//! Logging setup

/// Initialize the logging system
///
/// Defaults to `info` when `RUST_LOG` is not set.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init();
}
