//! Error types for the startup probe
//!
//! Only setup and launch failures shape the probe outcome; configuration
//! errors stop the binary before a probe is built.

use thiserror::Error;

/// Custom error types for the startup probe
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Invalid or unreadable probe configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The service handle could not be resolved or constructed
    #[error("Setup failed: {message}")]
    Setup { message: String },

    /// The service's run operation failed before the deadline
    #[error("Launch failed: {message}")]
    Launch { message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProbeError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ProbeError::Configuration { .. } => "configuration",
            ProbeError::Setup { .. } => "setup",
            ProbeError::Launch { .. } => "launch",
            ProbeError::Internal { .. } => "internal",
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        ProbeError::Configuration {
            message: message.into(),
        }
    }

    /// Create a setup error
    pub fn setup(message: impl Into<String>) -> Self {
        ProbeError::Setup {
            message: message.into(),
        }
    }

    /// Create a launch error
    pub fn launch(message: impl Into<String>) -> Self {
        ProbeError::Launch {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        ProbeError::Internal {
            message: message.into(),
        }
    }
}

/// Convert from IO errors raised while spawning or waiting on a service
impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::launch(format!("IO error: {}", err))
    }
}

/// Convert from TOML parsing errors
impl From<toml::de::Error> for ProbeError {
    fn from(err: toml::de::Error) -> Self {
        ProbeError::config(format!("TOML parsing error: {}", err))
    }
}

/// Convert from generic anyhow errors
impl From<anyhow::Error> for ProbeError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ProbeError>() {
            Ok(typed) => return typed,
            Err(err) => err,
        };

        // Try to determine the category based on the error message
        let message = format!("{:#}", err);
        let lower_message = message.to_lowercase();

        if lower_message.contains("config") {
            ProbeError::config(message)
        } else if lower_message.contains("not found") || lower_message.contains("resolve") {
            ProbeError::setup(message)
        } else if lower_message.contains("spawn") || lower_message.contains("exited") {
            ProbeError::launch(message)
        } else {
            ProbeError::internal(message)
        }
    }
}

/// Result type alias for probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;
