//! Startup Probe Library
//!
//! A bounded-time startup check for long-running MCP servers. The probe
//! resolves a service handle, launches it, and races the launch against a
//! deadline. Because the services it checks are meant to run forever, a
//! launch that is still alive when the deadline fires is a pass.
//!
//! ## Features
//!
//! - **Explicit launch configuration**: transport, host, port and verbosity
//!   are passed to the service, never written to the probe's own environment
//! - **External or built-in targets**: probe any server executable, or the
//!   bundled minimal MCP server
//! - **Three-way race**: completed, errored or timed out, with timeout
//!   counted as success

pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod process;
pub mod server;
pub mod service;

pub use config::{LaunchConfig, ProbeConfig, TargetConfig, Transport};
pub use error::{ProbeError, ProbeResult};
pub use probe::{launch_under_deadline, LaunchResult, ProbeOutcome, StartupProbe};
pub use service::{resolve_target, ServiceHandle};
