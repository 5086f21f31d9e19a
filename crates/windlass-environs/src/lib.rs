//! Windlass environments
//!
//! This crate carries the contract every cloud backend implements and
//! the orchestration that drives it: validated environment
//! configuration, the provider/environ abstraction, per-machine
//! provisioning parameters, and the bootstrap protocol that brings up
//! the first control-plane node and records where it is.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                embedding process                  │
//! │        (builds the ProviderRegistry at init)      │
//! └─────────────────┬────────────────────────────────┘
//!                   │
//! ┌─────────────────▼────────────────────────────────┐
//! │               windlass-environs                   │
//! │  ┌───────────────────────────────────────────┐   │
//! │  │   trait EnvironProvider / trait Environ    │   │
//! │  └───────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌─────────────────────────┐   │
//! │  │  bootstrap   │  │  BootstrapState record   │   │
//! │  │ orchestrator │  │  (windlass-storage)      │   │
//! │  └──────────────┘  └─────────────────────────┘   │
//! └───────┬──────────────────┬───────────────────────┘
//!         │                  │
//! ┌───────▼───────┐  ┌───────▼───────┐
//! │ cloud backend │  │ cloud backend │
//! │   provider    │  │   provider    │
//! └───────────────┘  └───────────────┘
//! ```

pub mod bootstrap;
pub mod certs;
pub mod config;
pub mod constraints;
pub mod environ;
pub mod error;
pub mod instance;
pub mod machine;
pub mod provider;
pub mod secrets;
pub mod state;

// Re-exports
pub use bootstrap::{BootstrapParams, bootstrap};
pub use config::{DEFAULT_API_PORT, DEFAULT_SERIES, DEFAULT_STATE_PORT, EnvironConfig};
pub use constraints::Constraints;
pub use environ::{
    Environ, InstanceLookup, Port, StartInstanceParams, StartedInstance, collect_instances,
};
pub use error::{EnvironError, Result};
pub use instance::{HardwareCharacteristics, Instance, InstanceId};
pub use machine::{
    ApiInfo, BOOTSTRAP_MACHINE_ID, MachineConfig, ProvisioningDefaults, StateInfo,
    bootstrap_machine_config, machine_tag,
};
pub use provider::{EnvironProvider, ProviderRegistry, self_address};
pub use secrets::password_hash;
pub use state::{BootstrapState, STATE_FILE, create_state_file, load_state, save_state, state_info};
