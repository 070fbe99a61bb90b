//! Configuration management for the startup probe
//!
//! Handles loading configuration from environment variables, TOML files,
//! and provides the reference defaults for every setting.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ProbeError;

/// Environment variable naming an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "STARTUP_PROBE_CONFIG";

/// Maximum accepted deadline in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Transport the service is asked to serve on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    Stdio,
    Sse,
    StreamableHttp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Stdio => "stdio",
            Transport::Sse => "sse",
            Transport::StreamableHttp => "streamable-http",
        }
    }

    /// Whether this transport binds a network listener
    pub fn is_network(&self) -> bool {
        !matches!(self, Transport::Stdio)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "sse" => Ok(Transport::Sse),
            "streamable-http" | "streamable_http" | "http" => Ok(Transport::StreamableHttp),
            other => Err(ProbeError::config(format!("Unknown transport: {}", other))),
        }
    }
}

/// Values handed to the service's run operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Transport kind (default: sse)
    pub transport: Transport,

    /// Bind host (default: 0.0.0.0)
    pub host: String,

    /// Bind port (default: 8000)
    pub port: u16,

    /// Log level requested from the service (default: debug)
    pub log_level: String,

    /// Ask the service to log to stdout (default: true)
    pub logging_stdout: bool,

    /// Ask the service for verbose logging (default: true)
    pub verbose: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Sse,
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "debug".to_string(),
            logging_stdout: true,
            verbose: true,
        }
    }
}

impl LaunchConfig {
    /// Environment a child service process is started with.
    ///
    /// Only the child sees these; the probe's own environment is never touched.
    pub fn env_vars(&self) -> BTreeMap<&'static str, String> {
        let mut vars = BTreeMap::new();
        vars.insert("TRANSPORT", self.transport.as_str().to_string());
        vars.insert("HOST", self.host.clone());
        vars.insert("PORT", self.port.to_string());
        vars.insert("MCP_LOGGING_STDOUT", self.logging_stdout.to_string());
        vars.insert("MCP_VERBOSE", self.verbose.to_string());
        vars.insert("MCP_LOG_LEVEL", self.log_level.clone());
        vars
    }
}

/// Which service the probe resolves and launches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetConfig {
    /// The crate's own minimal MCP server
    #[default]
    Builtin,

    /// An external server executable
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Main configuration structure for the startup probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Launch values passed to the service
    pub launch: LaunchConfig,

    /// Deadline in seconds (default: 5)
    pub timeout_seconds: u64,

    /// Treat a clean return before the deadline as a failure (default: false)
    pub require_running_at_deadline: bool,

    /// Service to probe
    pub target: TargetConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            launch: LaunchConfig::default(),
            timeout_seconds: 5,
            require_running_at_deadline: false,
            target: TargetConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// Load configuration from environment variables, TOML file, and defaults
    /// Priority: env vars > TOML file > defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            config = Self::load_from_file(&path)?;
            info!("Loaded configuration from {}", path);
        } else if let Ok(file_config) = Self::load_from_file("config/startup-probe.toml") {
            info!("Loaded configuration from TOML file");
            config = file_config;
        } else if let Ok(file_config) = Self::load_from_file("startup-probe.toml") {
            info!("Loaded configuration from TOML file in current directory");
            config = file_config;
        } else {
            debug!("No TOML configuration file found, using defaults and environment variables");
        }

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&content)
            .map_err(ProbeError::from)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn load_from_env(&mut self) {
        if let Ok(transport) = env::var("PROBE_TRANSPORT") {
            match transport.parse::<Transport>() {
                Ok(transport) => {
                    self.launch.transport = transport;
                    debug!("Set transport to {} from environment", transport);
                }
                Err(e) => warn!("Ignoring PROBE_TRANSPORT: {}", e),
            }
        }

        if let Ok(host) = env::var("PROBE_HOST") {
            self.launch.host = host;
            debug!("Loaded PROBE_HOST from environment");
        }

        if let Some(port) = parse_env::<u16>("PROBE_PORT") {
            self.launch.port = port;
            debug!("Set port to {} from environment", port);
        }

        if let Ok(level) = env::var("PROBE_LOG_LEVEL") {
            self.launch.log_level = level.to_lowercase();
        }

        if let Some(verbose) = parse_env::<bool>("PROBE_VERBOSE") {
            self.launch.verbose = verbose;
        }

        if let Some(stdout) = parse_env::<bool>("PROBE_LOGGING_STDOUT") {
            self.launch.logging_stdout = stdout;
        }

        if let Some(timeout) = parse_env::<u64>("PROBE_TIMEOUT_SECONDS") {
            self.timeout_seconds = timeout;
            debug!("Set timeout to {} seconds from environment", timeout);
        }

        if let Some(require) = parse_env::<bool>("PROBE_REQUIRE_RUNNING") {
            self.require_running_at_deadline = require;
        }

        // PROBE_TARGET_ARGS is split on whitespace with no quoting. Arguments
        // containing spaces need the `args` array in the TOML file.
        if let Ok(program) = env::var("PROBE_TARGET_COMMAND") {
            let args = env::var("PROBE_TARGET_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            self.target = TargetConfig::Command { program, args };
            debug!("Loaded PROBE_TARGET_COMMAND from environment");
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(ProbeError::config("timeout_seconds must be greater than 0").into());
        }

        if self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(ProbeError::config(format!(
                "timeout_seconds cannot exceed {}",
                MAX_TIMEOUT_SECONDS
            ))
            .into());
        }

        if self.launch.host.trim().is_empty() {
            return Err(ProbeError::config("host cannot be empty").into());
        }

        if self.launch.transport.is_network() && self.launch.port == 0 {
            return Err(ProbeError::config(format!(
                "port is required for the {} transport",
                self.launch.transport
            ))
            .into());
        }

        if let TargetConfig::Command { program, .. } = &self.target {
            if program.trim().is_empty() {
                return Err(ProbeError::config("target command cannot be empty").into());
            }
        }

        info!("Configuration validation successful");
        Ok(())
    }

    /// Deadline the launch is raced against
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}: {}", name, raw);
            None
        }
    }
}
