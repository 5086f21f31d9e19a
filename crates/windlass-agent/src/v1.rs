//! Legacy (format 1) layout and its one-hop migration

use crate::config::{AgentConfig, BOOTSTRAP_NONCE};
use crate::error::Result;
use crate::format::CONFIG_FILE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// The JSON shape written by format 1 deployments. Format 1 predates
/// provisioning nonces.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ConfV1 {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ca_cert: String,
    #[serde(default)]
    pub state_addresses: Vec<String>,
    #[serde(default)]
    pub api_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_server_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_server_key: Option<String>,
}

pub(crate) async fn read(dir: &Path) -> Result<ConfV1> {
    let content = fs::read(dir.join(CONFIG_FILE)).await?;
    Ok(serde_json::from_slice(&content)?)
}

/// Migrate a format 1 record into the current in-memory shape.
///
/// Machines written under format 1 were all provisioned before nonces
/// existed, which means they are bootstrap-era machines; the migration
/// assumes the bootstrap nonce. The directory itself is not rewritten
/// here: writers decide persistence.
pub(crate) fn migrate(legacy: ConfV1, data_dir: &Path, tag: &str) -> AgentConfig {
    AgentConfig {
        data_dir: data_dir.to_path_buf(),
        tag: tag.to_string(),
        nonce: BOOTSTRAP_NONCE.to_string(),
        ca_cert: legacy.ca_cert,
        password: legacy.password,
        state_addresses: legacy.state_addresses,
        api_addresses: legacy.api_addresses,
        state_server_cert: legacy.state_server_cert,
        state_server_key: legacy.state_server_key,
    }
}
