//! Durable bootstrap state
//!
//! The bootstrap record is the source of truth for "where is the
//! control plane": an environment-scoped storage object holding the
//! ordered control-plane instance ids and their reported hardware.

use crate::environ::{Environ, InstanceLookup};
use crate::error::{EnvironError, Result};
use crate::instance::{HardwareCharacteristics, InstanceId};
use crate::machine::{ApiInfo, StateInfo};
use serde::{Deserialize, Serialize};
use windlass_storage::{RetryPolicy, Storage};

/// Well-known storage object name of the bootstrap record.
pub const STATE_FILE: &str = "provider-state";

/// The durable record of which instances constitute the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapState {
    #[serde(default)]
    pub state_instances: Vec<InstanceId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characteristics: Vec<HardwareCharacteristics>,
}

/// Reserve the state slot: an addressable, initially empty record.
/// Returns the slot's externally fetchable URL.
///
/// This is first-writer-wins with no distributed lock; two concurrent
/// bootstraps of one environment race on the slot. Known limitation.
pub async fn create_state_file(storage: &dyn Storage) -> Result<String> {
    storage
        .put(STATE_FILE, b"")
        .await
        .map_err(EnvironError::CreateStateFile)?;
    let url = storage.url(STATE_FILE).map_err(EnvironError::CreateStateFile)?;
    tracing::debug!(%url, "reserved bootstrap state slot");
    Ok(url)
}

/// Persist `state`, replacing the slot's content entirely. A save is a
/// full overwrite, never a merge.
pub async fn save_state(storage: &dyn Storage, state: &BootstrapState) -> Result<()> {
    let content = serde_yaml::to_string(state)?;
    storage
        .put(STATE_FILE, content.as_bytes())
        .await
        .map_err(EnvironError::SaveState)
}

/// Read the bootstrap record back, retrying reads under `policy`.
///
/// A missing record means the environment was never bootstrapped,
/// surfaced distinctly from transport failures. A reserved-but-empty
/// slot reads as the empty record.
pub async fn load_state(storage: &dyn Storage, policy: RetryPolicy) -> Result<BootstrapState> {
    let data = policy
        .run(|| storage.get(STATE_FILE))
        .await
        .map_err(|err| {
            if err.is_not_found() {
                EnvironError::NotBootstrapped
            } else {
                EnvironError::LoadState(err)
            }
        })?;
    if data.is_empty() {
        return Ok(BootstrapState::default());
    }
    Ok(serde_yaml::from_slice(&data)?)
}

/// Assemble control-plane connection info from the stored record and
/// the live instances it names. Backend `Environ::state_info`
/// implementations usually delegate here.
pub async fn state_info(
    environ: &dyn Environ,
    policy: RetryPolicy,
) -> Result<(StateInfo, ApiInfo)> {
    let storage = environ.storage();
    let state = load_state(storage.as_ref(), policy).await?;
    if state.state_instances.is_empty() {
        return Err(EnvironError::NotBootstrapped);
    }
    let config = environ.config().await;

    let instances = match environ.instances(&state.state_instances).await? {
        InstanceLookup::Full(instances) => instances,
        InstanceLookup::Partial(slots) => slots.into_iter().flatten().collect(),
    };

    let mut state_addrs = Vec::new();
    let mut api_addrs = Vec::new();
    for instance in instances {
        if let Some(dns) = instance.dns_name().await? {
            state_addrs.push(format!("{dns}:{}", config.state_port()));
            api_addrs.push(format!("{dns}:{}", config.api_port()));
        }
    }
    if state_addrs.is_empty() {
        return Err(EnvironError::NoStateServers);
    }

    let ca_cert = config.ca_cert().unwrap_or_default();
    Ok((
        StateInfo {
            addrs: state_addrs,
            ca_cert: ca_cert.clone(),
            tag: String::new(),
            password: String::new(),
        },
        ApiInfo {
            addrs: api_addrs,
            ca_cert,
            tag: String::new(),
            password: String::new(),
        },
    ))
}
