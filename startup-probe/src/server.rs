//! Built-in MCP server used as the default probe target
//!
//! A deliberately small server built with the same PulseEngine macros as a
//! real deployment. Probing it exercises the transport startup path end to
//! end without needing an external server installed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulseengine_mcp_macros::{mcp_server, mcp_tools};
use pulseengine_mcp_server::{
    AuthConfig, HasServerInfo, McpServer, ServerConfig, TransportConfig,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument};

use crate::config::{LaunchConfig, Transport};
use crate::error::ProbeError;
use crate::service::ServiceHandle;

/// Name reported by the built-in server
pub const SERVER_NAME: &str = "Startup Probe MCP Server";

/// Server status information
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProbeServerStatus {
    pub server_name: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub tools_count: usize,
}

/// Parameters for the echo tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EchoParams {
    /// Text to send back
    pub message: String,
}

/// Minimal MCP server
#[mcp_server(
    name = "Startup Probe MCP Server",
    version = "0.1.0",
    description = "Minimal MCP server used to verify transport startup",
    auth = "disabled"
)]
#[derive(Clone)]
pub struct ProbeTargetServer {
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl Default for ProbeTargetServer {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

#[mcp_tools]
impl ProbeTargetServer {
    /// Liveness check, always answers "pong"
    #[instrument(skip(self))]
    pub async fn ping(&self) -> anyhow::Result<String> {
        Ok("pong".to_string())
    }

    /// Return the given message unchanged
    #[instrument(skip(self))]
    pub async fn echo(&self, params: EchoParams) -> anyhow::Result<String> {
        Ok(params.message)
    }

    /// Get server status and uptime
    #[instrument(skip(self))]
    pub async fn get_server_status(&self) -> anyhow::Result<ProbeServerStatus> {
        Ok(ProbeServerStatus {
            server_name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: self.started_at,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            tools_count: 3, // ping, echo, get_server_status
        })
    }
}

/// Service handle wrapping the built-in server
#[derive(Clone, Default)]
pub struct BuiltinService {
    server: ProbeTargetServer,
}

impl BuiltinService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceHandle for BuiltinService {
    fn name(&self) -> &str {
        SERVER_NAME
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    #[instrument(skip(self, launch), fields(transport = %launch.transport))]
    async fn run(&self, launch: &LaunchConfig) -> anyhow::Result<()> {
        let mut server = McpServer::new(self.server.clone(), server_config(launch))
            .await
            .map_err(|e| ProbeError::launch(format!("failed to create server: {}", e)))?;

        info!(host = %launch.host, port = launch.port, "Starting {}", SERVER_NAME);

        server.run().await.map_err(|e| {
            ProbeError::launch(format!(
                "{} transport on {}:{}: {}",
                launch.transport, launch.host, launch.port, e
            ))
        })?;

        Ok(())
    }
}

/// Server configuration for the requested transport, with auth disabled
fn server_config(launch: &LaunchConfig) -> ServerConfig {
    let mut auth_config = AuthConfig::memory();
    auth_config.enabled = false;

    ServerConfig {
        server_info: <ProbeTargetServer as HasServerInfo>::server_info(),
        auth_config,
        transport_config: transport_config(launch),
        ..Default::default()
    }
}

fn transport_config(launch: &LaunchConfig) -> TransportConfig {
    let host = Some(launch.host.clone());
    match launch.transport {
        Transport::Stdio => TransportConfig::Stdio,
        Transport::Sse => TransportConfig::Http {
            port: launch.port,
            host,
        },
        Transport::StreamableHttp => TransportConfig::StreamableHttp {
            port: launch.port,
            host,
        },
    }
}
