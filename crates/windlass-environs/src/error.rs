//! Environment and bootstrap error types

use thiserror::Error;
use windlass_storage::StorageError;

/// Errors surfaced by providers, environs, and the bootstrap
/// orchestrator.
///
/// Validation messages are stable and field-specific; wrapped
/// operational errors carry short context prefixes. Nothing here is
/// fatal to the process.
#[derive(Error, Debug)]
pub enum EnvironError {
    #[error("no registered provider for type {0:?}")]
    UnknownProvider(String),

    #[error("provider {0:?} registered twice")]
    DuplicateProvider(String),

    #[error("{0} not found in configuration")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid machine configuration: missing {0}")]
    MissingMachineField(&'static str),

    #[error("invalid machine configuration: {0}")]
    InvalidMachineConfig(String),

    #[error("invalid constraint {0:?}")]
    InvalidConstraint(String),

    /// Zero of the requested instances exist.
    #[error("no instances found")]
    NoInstances,

    #[error("no state server addresses found")]
    NoStateServers,

    #[error("environment is not bootstrapped")]
    NotBootstrapped,

    #[error("environment is already bootstrapped")]
    AlreadyBootstrapped,

    #[error("{0} not supported by this provider")]
    Unsupported(&'static str),

    #[error("cannot create initial state file: {0}")]
    CreateStateFile(#[source] StorageError),

    #[error("cannot save state: {0}")]
    SaveState(#[source] StorageError),

    #[error("cannot load state: {0}")]
    LoadState(#[source] StorageError),

    #[error("cannot start bootstrap instance: {0}")]
    StartInstance(#[source] Box<EnvironError>),

    /// A failure reported by the backend, passed through verbatim.
    #[error("{0}")]
    Provider(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("certificate generation failed: {0}")]
    Cert(#[from] rcgen::Error),

    #[error("agent configuration error: {0}")]
    Agent(#[from] windlass_agent::AgentError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, EnvironError>;
