//! Service handles the probe can launch

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::{LaunchConfig, TargetConfig};
use crate::process::ProcessService;
use crate::server::BuiltinService;

/// A long-running service entry point.
///
/// `run` is expected to keep going until its transport closes or the future
/// is dropped; returning early, either way, ends the probe's race.
#[async_trait]
pub trait ServiceHandle: Send + Sync {
    /// Human-readable service name
    fn name(&self) -> &str;

    /// Type descriptor of the concrete handle
    fn type_name(&self) -> &'static str;

    /// Serve using the given launch values
    async fn run(&self, launch: &LaunchConfig) -> anyhow::Result<()>;
}

/// Resolve the configured target into a launchable handle
#[instrument]
pub fn resolve_target(target: &TargetConfig) -> anyhow::Result<Box<dyn ServiceHandle>> {
    match target {
        TargetConfig::Builtin => {
            debug!("Using built-in MCP server as probe target");
            Ok(Box::new(BuiltinService::new()))
        }
        TargetConfig::Command { program, args } => {
            let service = ProcessService::resolve(program, args.clone())?;
            Ok(Box::new(service))
        }
    }
}
