//! Agent configuration error types

use thiserror::Error;

/// Errors produced while building, reading, or writing agent
/// configuration.
///
/// Validation messages are stable: tooling matches on the exact text.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0} not found in configuration")]
    Missing(&'static str),

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("unknown agent config format {0:?}")]
    UnknownFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
