//! Startup probe for MCP servers
//!
//! Launches the configured server for a few seconds and exits 0 if it is
//! still running at the deadline (or exited cleanly), 1 otherwise.

use startup_probe::logging::init_logging;
use startup_probe::{resolve_target, ProbeConfig, ProbeError, StartupProbe};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Configure logging before loading config so its warnings are visible
    let logging = init_logging();

    info!("Starting startup probe...");

    let config = match ProbeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            let err = ProbeError::from(e);
            error!(category = err.category(), "Failed to load probe configuration: {}", err);
            println!("❌ Invalid probe configuration: {}", err);
            println!("\nPlease check:");
            println!("  - STARTUP_PROBE_CONFIG points to a readable TOML file");
            println!("  - PROBE_* environment variables hold valid values");
            std::process::exit(1);
        }
    };

    logging.apply_launch(&config.launch);

    let target = config.target.clone();
    let probe = StartupProbe::new(config);

    let mut stdout = std::io::stdout();
    let outcome = probe.run(|| resolve_target(&target), &mut stdout).await;

    info!("Startup probe finished: {}", outcome);
    std::process::exit(outcome.exit_code());
}
