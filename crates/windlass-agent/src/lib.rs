//! Windlass agent configuration
//!
//! Every provisioned machine runs an agent that connects back to the
//! control plane. This crate owns that agent's on-disk configuration:
//! a versioned, migratable format written atomically under
//! `<data_dir>/agents/<tag>/`, together with the shell-command
//! rendering used to seed a remote machine during provisioning.
//!
//! The format is named by a single-line marker file next to the config;
//! a directory without a marker predates the marker and is read as the
//! previous format, then migrated in memory.

pub mod config;
pub mod error;
pub mod format;
mod v1;

// Re-exports
pub use config::{AgentConfig, AgentParams, BOOTSTRAP_NONCE, random_password};
pub use error::{AgentError, Result};
pub use format::{CONFIG_FILE, FORMAT_FILE, Format, read_format};
