//! Machine configuration composition
//!
//! A [`MachineConfig`] is the ephemeral parameter bundle a backend
//! needs to initialize one newly started machine. It is built fresh for
//! each start-instance call and never persisted: its secret-bearing
//! fields are only safe for the single instance being provisioned.

use crate::certs;
use crate::config::{DEFAULT_API_PORT, DEFAULT_STATE_PORT, EnvironConfig};
use crate::constraints::Constraints;
use crate::error::{EnvironError, Result};
use crate::secrets::password_hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use windlass_agent::{AgentParams, BOOTSTRAP_NONCE};
use windlass_tools::Tools;

/// Machine id of the first (control-plane) node.
pub const BOOTSTRAP_MACHINE_ID: &str = "0";

/// Connection details for the control-plane state service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    pub addrs: Vec<String>,
    pub ca_cert: String,
    pub tag: String,
    pub password: String,
}

/// Connection details for the control-plane API service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub addrs: Vec<String>,
    pub ca_cert: String,
    pub tag: String,
    pub password: String,
}

/// Caller-supplied defaults for provisioning paths.
///
/// Passed explicitly into composition and bootstrap; the core never
/// consults process-global state for these.
#[derive(Debug, Clone)]
pub struct ProvisioningDefaults {
    pub data_dir: PathBuf,
}

impl Default for ProvisioningDefaults {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/windlass"),
        }
    }
}

/// The entity tag of a machine agent.
pub fn machine_tag(machine_id: &str) -> String {
    format!("machine-{machine_id}")
}

/// Per-instance provisioning parameters.
pub struct MachineConfig {
    pub machine_id: String,
    /// One-time token proving this machine's provisioning request is
    /// genuine.
    pub nonce: String,
    pub data_dir: PathBuf,
    /// Connection info for an existing control plane. `None` on the
    /// bootstrap node, which derives its own credentials instead.
    pub state_info: Option<StateInfo>,
    pub api_info: Option<ApiInfo>,
    /// The tools build the machine will run; chosen by the backend from
    /// the candidate list it is started with.
    pub tools: Option<Tools>,
    pub authorized_keys: String,
    /// Extra environment for the machine agent.
    pub agent_env: BTreeMap<String, String>,
    /// Whether this machine hosts the control plane.
    pub state_server: bool,
    pub state_port: u16,
    pub api_port: u16,
    /// Bootstrap-node secrets, derived from the environment config.
    pub ca_cert: Option<String>,
    pub admin_password: Option<String>,
    pub state_server_cert: Option<String>,
    pub state_server_key: Option<String>,
    /// Address of the reserved bootstrap state record.
    pub state_url: Option<String>,
    pub constraints: Constraints,
}

impl MachineConfig {
    /// A plain (non-control-plane) machine config. The caller supplies
    /// connection info before use.
    pub fn new(
        defaults: &ProvisioningDefaults,
        machine_id: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            nonce: nonce.into(),
            data_dir: defaults.data_dir.clone(),
            state_info: None,
            api_info: None,
            tools: None,
            authorized_keys: String::new(),
            agent_env: BTreeMap::new(),
            state_server: false,
            state_port: DEFAULT_STATE_PORT,
            api_port: DEFAULT_API_PORT,
            ca_cert: None,
            admin_password: None,
            state_server_cert: None,
            state_server_key: None,
            state_url: None,
            constraints: Constraints::default(),
        }
    }

    /// Validation gate run before a config is used to provision.
    ///
    /// Fails fast with a named missing-field error rather than
    /// proceeding with partial secrets.
    pub fn verify(&self) -> Result<()> {
        if self.machine_id.is_empty() {
            return Err(EnvironError::MissingMachineField("machine id"));
        }
        if self.nonce.is_empty() {
            return Err(EnvironError::MissingMachineField("machine nonce"));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(EnvironError::MissingMachineField("data directory"));
        }
        if self.tools.is_none() {
            return Err(EnvironError::MissingMachineField("tools"));
        }
        if self.authorized_keys.is_empty() {
            return Err(EnvironError::MissingMachineField("authorized SSH keys"));
        }
        if self.state_server {
            // Connection info on a state server means someone is trying
            // to bootstrap into an environment that already has a
            // control plane.
            if self.state_info.is_some() || self.api_info.is_some() {
                return Err(EnvironError::InvalidMachineConfig(
                    "state server configuration must not carry connection info".to_string(),
                ));
            }
            if self.ca_cert.is_none() {
                return Err(EnvironError::MissingMachineField("CA certificate"));
            }
            if self.admin_password.is_none() {
                return Err(EnvironError::MissingMachineField("admin secret"));
            }
            if self.state_server_cert.is_none() {
                return Err(EnvironError::MissingMachineField("state server certificate"));
            }
            if self.state_server_key.is_none() {
                return Err(EnvironError::MissingMachineField("state server private key"));
            }
        } else {
            let state_info = self
                .state_info
                .as_ref()
                .ok_or(EnvironError::MissingMachineField("state info"))?;
            if state_info.addrs.is_empty() {
                return Err(EnvironError::InvalidMachineConfig(
                    "state info has no addresses".to_string(),
                ));
            }
            let api_info = self
                .api_info
                .as_ref()
                .ok_or(EnvironError::MissingMachineField("API info"))?;
            if api_info.addrs.is_empty() {
                return Err(EnvironError::InvalidMachineConfig(
                    "API info has no addresses".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The agent configuration seeded onto this machine during
    /// provisioning. A state server points its agent at itself.
    pub fn agent_params(&self) -> Result<AgentParams> {
        let tag = machine_tag(&self.machine_id);
        if self.state_server {
            let password = self
                .admin_password
                .clone()
                .ok_or(EnvironError::MissingMachineField("admin secret"))?;
            let ca_cert = self
                .ca_cert
                .clone()
                .ok_or(EnvironError::MissingMachineField("CA certificate"))?;
            Ok(AgentParams {
                data_dir: self.data_dir.clone(),
                tag,
                nonce: self.nonce.clone(),
                ca_cert,
                password,
                state_addresses: vec![format!("localhost:{}", self.state_port)],
                api_addresses: vec![format!("localhost:{}", self.api_port)],
                state_server_cert: self.state_server_cert.clone(),
                state_server_key: self.state_server_key.clone(),
            })
        } else {
            let state_info = self
                .state_info
                .as_ref()
                .ok_or(EnvironError::MissingMachineField("state info"))?;
            let api_info = self
                .api_info
                .as_ref()
                .ok_or(EnvironError::MissingMachineField("API info"))?;
            Ok(AgentParams {
                data_dir: self.data_dir.clone(),
                tag,
                nonce: self.nonce.clone(),
                ca_cert: state_info.ca_cert.clone(),
                password: state_info.password.clone(),
                state_addresses: state_info.addrs.clone(),
                api_addresses: api_info.addrs.clone(),
                state_server_cert: None,
                state_server_key: None,
            })
        }
    }
}

/// Compose the bootstrap node's machine configuration.
///
/// Control-plane secrets are derived from the environment config: the
/// admin secret (hashed before it leaves this function) and the CA
/// certificate, plus a freshly generated CA-signed server certificate.
pub fn bootstrap_machine_config(
    config: &EnvironConfig,
    defaults: &ProvisioningDefaults,
) -> Result<MachineConfig> {
    let admin_secret = config
        .admin_secret()
        .ok_or(EnvironError::Missing("admin-secret"))?;
    let ca_cert = config.ca_cert().ok_or(EnvironError::Missing("ca-cert"))?;
    let ca_key = config
        .ca_private_key()
        .ok_or(EnvironError::Missing("ca-private-key"))?;
    let (server_cert, server_key) = certs::new_server(&ca_cert, &ca_key, &["localhost"])?;

    let mut machine_config =
        MachineConfig::new(defaults, BOOTSTRAP_MACHINE_ID, BOOTSTRAP_NONCE);
    machine_config.state_server = true;
    machine_config.state_port = config.state_port();
    machine_config.api_port = config.api_port();
    machine_config.authorized_keys = config.authorized_keys();
    machine_config.ca_cert = Some(ca_cert);
    machine_config.admin_password = Some(password_hash(&admin_secret));
    machine_config.state_server_cert = Some(server_cert);
    machine_config.state_server_key = Some(server_key);
    Ok(machine_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use serde_json::json;
    use windlass_agent::AgentConfig;
    use windlass_tools::ToolsVersion;

    fn env_config() -> EnvironConfig {
        let (ca_cert, ca_key) = certs::new_ca("staging").unwrap();
        let mut attrs = BTreeMap::new();
        attrs.insert("name".to_string(), json!("staging"));
        attrs.insert("type".to_string(), json!("dummy"));
        attrs.insert("admin-secret".to_string(), json!("sekrit"));
        attrs.insert("ca-cert".to_string(), json!(ca_cert));
        attrs.insert("ca-private-key".to_string(), json!(ca_key));
        attrs.insert("authorized-keys".to_string(), json!("ssh-ed25519 AAAA dev"));
        EnvironConfig::new(attrs).unwrap()
    }

    fn fake_tools() -> Tools {
        Tools {
            version: ToolsVersion::new(Version::parse("1.16.0").unwrap(), "linux", "amd64"),
            url: "mem://staging/tools/juju-1.16.0-linux-amd64.tgz".to_string(),
        }
    }

    #[test]
    fn bootstrap_config_derives_secrets() {
        let config = env_config();
        let mcfg = bootstrap_machine_config(&config, &ProvisioningDefaults::default()).unwrap();

        assert_eq!(mcfg.machine_id, BOOTSTRAP_MACHINE_ID);
        assert_eq!(mcfg.nonce, BOOTSTRAP_NONCE);
        assert!(mcfg.state_server);
        assert!(mcfg.state_info.is_none() && mcfg.api_info.is_none());
        assert_eq!(mcfg.admin_password.as_deref(), Some(password_hash("sekrit").as_str()));
        assert_ne!(mcfg.admin_password.as_deref(), Some("sekrit"));
        assert!(mcfg.state_server_cert.is_some() && mcfg.state_server_key.is_some());
    }

    #[test]
    fn bootstrap_config_requires_each_secret() {
        let defaults = ProvisioningDefaults::default();
        for (key, want) in [
            ("admin-secret", "admin-secret not found in configuration"),
            ("ca-cert", "ca-cert not found in configuration"),
            ("ca-private-key", "ca-private-key not found in configuration"),
        ] {
            let mut attrs = env_config().attrs().clone();
            attrs.remove(key);
            let config = EnvironConfig::new(attrs).unwrap();
            let err = bootstrap_machine_config(&config, &defaults).err().unwrap();
            assert_eq!(err.to_string(), want);
        }
    }

    #[test]
    fn verify_accepts_a_complete_bootstrap_config() {
        let mut mcfg =
            bootstrap_machine_config(&env_config(), &ProvisioningDefaults::default()).unwrap();
        mcfg.tools = Some(fake_tools());
        mcfg.verify().unwrap();
    }

    #[test]
    fn verify_names_the_missing_field() {
        let defaults = ProvisioningDefaults::default();
        let complete = |mutator: &dyn Fn(&mut MachineConfig)| {
            let mut mcfg = bootstrap_machine_config(&env_config(), &defaults).unwrap();
            mcfg.tools = Some(fake_tools());
            mutator(&mut mcfg);
            mcfg.verify().unwrap_err().to_string()
        };

        assert_eq!(
            complete(&|m| m.machine_id = String::new()),
            "invalid machine configuration: missing machine id"
        );
        assert_eq!(
            complete(&|m| m.nonce = String::new()),
            "invalid machine configuration: missing machine nonce"
        );
        assert_eq!(
            complete(&|m| m.tools = None),
            "invalid machine configuration: missing tools"
        );
        assert_eq!(
            complete(&|m| m.authorized_keys = String::new()),
            "invalid machine configuration: missing authorized SSH keys"
        );
        assert_eq!(
            complete(&|m| m.state_server_key = None),
            "invalid machine configuration: missing state server private key"
        );
    }

    #[test]
    fn verify_rejects_state_server_with_connection_info() {
        let mut mcfg =
            bootstrap_machine_config(&env_config(), &ProvisioningDefaults::default()).unwrap();
        mcfg.tools = Some(fake_tools());
        mcfg.state_info = Some(StateInfo {
            addrs: vec!["elsewhere:37017".to_string()],
            ..StateInfo::default()
        });

        let err = mcfg.verify().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid machine configuration: state server configuration must not carry connection info"
        );
    }

    #[test]
    fn verify_requires_connection_info_on_plain_machines() {
        let defaults = ProvisioningDefaults::default();
        let mut mcfg = MachineConfig::new(&defaults, "7", "nonce-7");
        mcfg.tools = Some(fake_tools());
        mcfg.authorized_keys = "ssh-ed25519 AAAA dev".to_string();

        let err = mcfg.verify().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid machine configuration: missing state info"
        );
    }

    #[test]
    fn bootstrap_agent_params_point_at_the_machine_itself() {
        let mcfg =
            bootstrap_machine_config(&env_config(), &ProvisioningDefaults::default()).unwrap();
        let params = mcfg.agent_params().unwrap();
        assert_eq!(params.tag, "machine-0");
        assert_eq!(params.state_addresses, vec!["localhost:37017".to_string()]);
        assert_eq!(params.api_addresses, vec!["localhost:17070".to_string()]);

        // The seeded parameters must satisfy agent-side validation.
        AgentConfig::new(params).unwrap();
    }
}
