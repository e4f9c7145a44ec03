use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `RUNWAY_LOG=runway=debug`.
pub const LOG_ENV: &str = "RUNWAY_LOG";

/// Installs the global subscriber. Logs go to stderr so JSON results on
/// stdout stay machine-readable. Defaults to `info` if `RUNWAY_LOG` is unset
/// or unparseable; a second call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    install(filter);
}

/// Installs the subscriber with an explicit filter string.
pub fn init_tracing_with_filter(filter: &str) {
    install(EnvFilter::new(filter));
}

fn install(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
