//! The live environment contract every backend implements

use crate::config::EnvironConfig;
use crate::constraints::Constraints;
use crate::error::{EnvironError, Result};
use crate::instance::{HardwareCharacteristics, Instance, InstanceId};
use crate::machine::{ApiInfo, MachineConfig, StateInfo};
use crate::provider::EnvironProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use windlass_storage::Storage;
use windlass_tools::Tools;

/// A single network port opened on an environment's firewall.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub protocol: String,
    pub number: u16,
}

/// Everything a backend needs to start one instance.
pub struct StartInstanceParams {
    pub machine_config: MachineConfig,
    pub constraints: Constraints,
    /// Candidate tool builds; the backend picks the build matching the
    /// platform it starts.
    pub possible_tools: Vec<Tools>,
}

/// A freshly started instance plus whatever hardware the backend
/// reported for it.
pub struct StartedInstance {
    pub instance: Arc<dyn Instance>,
    pub hardware: Option<HardwareCharacteristics>,
}

/// Outcome of an [`Environ::instances`] lookup that matched at least
/// one id. Zero matches (or an empty request) surface as
/// [`EnvironError::NoInstances`] instead, so callers can tell "nothing
/// found", "some missing", and "all found" apart.
pub enum InstanceLookup {
    /// Every requested id was found; results are in request order.
    Full(Vec<Arc<dyn Instance>>),
    /// Some ids were found; unmatched positions hold `None`.
    Partial(Vec<Option<Arc<dyn Instance>>>),
}

/// A live handle to one environment on one backend.
///
/// Handles are shared across threads; implementations must serialize
/// internal config mutation (a mutex around the current
/// [`EnvironConfig`]) even though instance operations may proceed
/// concurrently.
#[async_trait]
pub trait Environ: Send + Sync {
    /// The environment's name, as configured.
    async fn name(&self) -> String {
        self.config().await.name().to_string()
    }

    /// Snapshot of the current configuration.
    async fn config(&self) -> EnvironConfig;

    /// Replace the current configuration.
    ///
    /// Must not retroactively change [`Storage`] handles already
    /// obtained from [`Environ::storage`].
    async fn set_config(&self, config: EnvironConfig) -> Result<()>;

    /// The environment's blob storage.
    fn storage(&self) -> Arc<dyn Storage>;

    async fn start_instance(&self, params: StartInstanceParams) -> Result<StartedInstance>;

    async fn stop_instances(&self, ids: &[InstanceId]) -> Result<()>;

    /// Look up instances by id; see [`InstanceLookup`] for the result
    /// contract. Backends usually delegate to [`collect_instances`].
    async fn instances(&self, ids: &[InstanceId]) -> Result<InstanceLookup>;

    async fn all_instances(&self) -> Result<Vec<Arc<dyn Instance>>>;

    /// Connection info for this environment's control plane; fails with
    /// [`EnvironError::NotBootstrapped`] before bootstrap.
    async fn state_info(&self) -> Result<(StateInfo, ApiInfo)>;

    /// Tear the environment down, instances and storage included.
    async fn destroy(&self) -> Result<()>;

    async fn open_ports(&self, _ports: &[Port]) -> Result<()> {
        Err(EnvironError::Unsupported("opening ports"))
    }

    async fn close_ports(&self, _ports: &[Port]) -> Result<()> {
        Err(EnvironError::Unsupported("closing ports"))
    }

    async fn ports(&self) -> Result<Vec<Port>> {
        Err(EnvironError::Unsupported("listing ports"))
    }

    fn provider(&self) -> Arc<dyn EnvironProvider>;
}

/// Assemble an [`InstanceLookup`] from the subset of requested ids a
/// backend found, preserving request order and filling unmatched
/// positions with `None`.
pub fn collect_instances(
    requested: &[InstanceId],
    mut found: HashMap<InstanceId, Arc<dyn Instance>>,
) -> Result<InstanceLookup> {
    if requested.is_empty() {
        return Err(EnvironError::NoInstances);
    }
    let mut matched = 0;
    let mut slots = Vec::with_capacity(requested.len());
    for id in requested {
        match found.remove(id) {
            Some(instance) => {
                matched += 1;
                slots.push(Some(instance));
            }
            None => slots.push(None),
        }
    }
    if matched == 0 {
        Err(EnvironError::NoInstances)
    } else if matched == requested.len() {
        Ok(InstanceLookup::Full(slots.into_iter().flatten().collect()))
    } else {
        Ok(InstanceLookup::Partial(slots))
    }
}
