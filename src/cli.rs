//! CLI command implementations for Dronefall.

pub(crate) mod catalog;
pub(crate) mod galaxy;
pub(crate) mod host;

use clap::ValueEnum;
use std::error::Error;
use std::fmt;

/// Output format for the inspection commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("JSON encoding failed: {e}"))
    }
}

impl From<dronefall::ConfigError> for CliError {
    fn from(e: dronefall::ConfigError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<dronefall::SetupError> for CliError {
    fn from(e: dronefall::SetupError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<dronefall::SessionError> for CliError {
    fn from(e: dronefall::SessionError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<dronefall::galaxy::MapGenError> for CliError {
    fn from(e: dronefall::galaxy::MapGenError) -> Self {
        Self::new(e.to_string())
    }
}
