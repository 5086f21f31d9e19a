//! Instances and their reported hardware

use crate::constraints::{format_size, parse_size};
use crate::error::{EnvironError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend-assigned identifier of one compute instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        InstanceId(id.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        InstanceId(id)
    }
}

/// A running (or starting) compute instance.
#[async_trait]
pub trait Instance: Send + Sync {
    fn id(&self) -> InstanceId;

    /// DNS name of the instance, `None` while the backend has not
    /// allocated one yet.
    async fn dns_name(&self) -> Result<Option<String>>;

    /// Known addresses of the instance.
    async fn addresses(&self) -> Result<Vec<String>> {
        Ok(self.dns_name().await?.into_iter().collect())
    }
}

/// Hardware a backend reports it actually allocated for an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareCharacteristics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_power: Option<u64>,
    /// Memory in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<u64>,
}

impl fmt::Display for HardwareCharacteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(arch) = &self.arch {
            parts.push(format!("arch={arch}"));
        }
        if let Some(cores) = self.cpu_cores {
            parts.push(format!("cores={cores}"));
        }
        if let Some(power) = self.cpu_power {
            parts.push(format!("cpu-power={power}"));
        }
        if let Some(mem) = self.mem {
            parts.push(format!("mem={}", format_size(mem)));
        }
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for HardwareCharacteristics {
    type Err = EnvironError;

    /// Parse a hardware description such as `arch=amd64 cores=1 mem=2T`.
    fn from_str(s: &str) -> Result<Self> {
        let mut hardware = HardwareCharacteristics::default();
        for token in s.split_whitespace() {
            let bad = || EnvironError::InvalidConstraint(token.to_string());
            let (key, value) = token.split_once('=').ok_or_else(bad)?;
            match key {
                "arch" => hardware.arch = Some(value.to_string()),
                "cores" => hardware.cpu_cores = Some(value.parse().map_err(|_| bad())?),
                "cpu-power" => hardware.cpu_power = Some(value.parse().map_err(|_| bad())?),
                "mem" => hardware.mem = Some(parse_size(value).ok_or_else(bad)?),
                _ => return Err(bad()),
            }
        }
        Ok(hardware)
    }
}
