//! Logging setup
//!
//! Logs go to stderr so stdout carries only the probe's status lines. The
//! subscriber is installed before configuration is loaded, so config warnings
//! are visible; the filter is narrowed to the configured verbosity afterwards.

use tracing::warn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::config::LaunchConfig;

/// Filter used until the configuration has been loaded
pub const STARTUP_DIRECTIVE: &str = "info";

/// Default filter directive for the given launch flags
pub fn default_directive(launch: &LaunchConfig) -> &'static str {
    if launch.verbose {
        "debug"
    } else {
        "info"
    }
}

/// Handle for adjusting the filter once the launch flags are known
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LoggingHandle {
    /// Switch to the launch verbosity. `RUST_LOG` takes precedence.
    pub fn apply_launch(&self, launch: &LaunchConfig) {
        if self.from_env {
            return;
        }

        if let Err(e) = self
            .filter
            .reload(EnvFilter::new(default_directive(launch)))
        {
            warn!("Failed to update log filter: {}", e);
        }
    }
}

/// Install the global subscriber. Calling this twice is harmless; only the
/// first call's subscriber is installed.
pub fn init_logging() -> LoggingHandle {
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let filter = env_filter.unwrap_or_else(|| EnvFilter::new(STARTUP_DIRECTIVE));

    let (filter, handle) = reload::Layer::new(filter);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();

    LoggingHandle {
        filter: handle,
        from_env,
    }
}
