//! The bootstrap orchestrator
//!
//! A linear provisioning protocol with one compensating branch:
//! reserve the state slot, start the first instance, record it. If
//! recording fails after the instance started, the instance is stopped
//! best-effort and the recording failure stays authoritative.

use crate::constraints::Constraints;
use crate::environ::{Environ, StartInstanceParams};
use crate::error::{EnvironError, Result};
use crate::machine::{ProvisioningDefaults, bootstrap_machine_config};
use crate::state::{BootstrapState, STATE_FILE, create_state_file, save_state};
use windlass_storage::verify_writable;
use windlass_tools::Tools;

/// Caller inputs to [`bootstrap`].
#[derive(Default)]
pub struct BootstrapParams {
    pub constraints: Constraints,
    /// Candidate tool builds for the new instance.
    pub possible_tools: Vec<Tools>,
    pub defaults: ProvisioningDefaults,
}

/// Provision the first control-plane node of `environ` and durably
/// record its identity.
///
/// Not safe against two concurrent bootstraps of the same environment:
/// reserving the state slot takes no distributed lock. Known
/// limitation.
pub async fn bootstrap(environ: &dyn Environ, params: BootstrapParams) -> Result<()> {
    let config = environ.config().await;
    tracing::info!(environment = %config.name(), "bootstrapping environment");
    let storage = environ.storage();

    verify_writable(storage.as_ref()).await?;

    match storage.get(STATE_FILE).await {
        Ok(_) => return Err(EnvironError::AlreadyBootstrapped),
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    let state_url = create_state_file(storage.as_ref()).await?;

    let mut machine_config = bootstrap_machine_config(&config, &params.defaults)?;
    machine_config.constraints = params.constraints.clone();
    machine_config.state_url = Some(state_url);

    let started = environ
        .start_instance(StartInstanceParams {
            machine_config,
            constraints: params.constraints,
            possible_tools: params.possible_tools,
        })
        .await
        .map_err(|err| EnvironError::StartInstance(Box::new(err)))?;

    let instance_id = started.instance.id();
    tracing::info!(instance = %instance_id, "started bootstrap instance");

    // Compensation for the instance that now exists, invoked only if
    // recording the state fails. Its own failure must never mask the
    // recording failure.
    let rollback = || async {
        environ
            .stop_instances(std::slice::from_ref(&instance_id))
            .await
    };

    let state = BootstrapState {
        state_instances: vec![instance_id.clone()],
        characteristics: started.hardware.into_iter().collect(),
    };
    if let Err(err) = save_state(storage.as_ref(), &state).await {
        if let Err(stop_err) = rollback().await {
            tracing::error!(instance = %instance_id, "cannot stop bootstrap instance: {stop_err}");
        }
        return Err(err);
    }

    tracing::info!(environment = %config.name(), "bootstrap state recorded");
    Ok(())
}
