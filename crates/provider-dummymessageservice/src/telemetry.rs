use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing with the given log level.
///
/// Uses `RUST_LOG` env var if set, otherwise falls back to the provided level.
/// `debug` forces the `debug` level for this crate and `kube`.
pub fn init(log_level: &str, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level, debug)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn default_directives(log_level: &str, debug: bool) -> String {
    if debug {
        "info,provider_dummymessageservice=debug,kube=debug".to_string()
    } else {
        log_level.to_string()
    }
}
