//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the filter comes from the
//! `[logging]` section of the settings. Initialization is idempotent: a
//! second call, or a subscriber installed by the host application, is left
//! alone.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Build the filter `init_with_config` would install
pub fn filter_for(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("warn"))
    })
}

/// Install a fmt subscriber on stderr. Returns false when a global
/// subscriber was already set.
pub fn init_with_config(config: &LoggingConfig) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter_for(config))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %config.directives(), "Logging initialized");
    }
    installed
}

/// Install a subscriber with the default logging settings
pub fn init() -> bool {
    init_with_config(&LoggingConfig::default())
}
