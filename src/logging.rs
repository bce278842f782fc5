use tracing::debug;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, registry};

/// `RUST_LOG` wins over the configured level; an unparsable level falls back to `info`.
pub fn env_filter(configured_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .parse(configured_level)
            .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Installs the global subscriber. Logs go to stderr so command output on stdout stays
/// machine readable. Calling this twice is harmless.
pub fn init(configured_level: &str) {
    let installed = registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter(configured_level)),
        )
        .try_init();
    if installed.is_ok() {
        debug!(level = configured_level, "logging initialized");
    }
}
