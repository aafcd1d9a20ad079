//! Log output setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Returns `false` if a
/// subscriber was already installed, which makes repeated calls harmless.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}
