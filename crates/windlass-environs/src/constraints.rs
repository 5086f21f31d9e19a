//! Caller resource constraints

use crate::error::{EnvironError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource demands a caller places on a new instance.
///
/// All fields are optional; backends satisfy what they can and report
/// what they actually allocated as
/// [`HardwareCharacteristics`](crate::instance::HardwareCharacteristics).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u64>,
    /// Minimum memory, in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<u64>,
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(arch) = &self.arch {
            parts.push(format!("arch={arch}"));
        }
        if let Some(cores) = self.cpu_cores {
            parts.push(format!("cores={cores}"));
        }
        if let Some(mem) = self.mem {
            parts.push(format!("mem={}", format_size(mem)));
        }
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for Constraints {
    type Err = EnvironError;

    /// Parse a constraints expression such as `arch=amd64 cores=2 mem=4G`.
    fn from_str(s: &str) -> Result<Self> {
        let mut constraints = Constraints::default();
        for token in s.split_whitespace() {
            let bad = || EnvironError::InvalidConstraint(token.to_string());
            let (key, value) = token.split_once('=').ok_or_else(bad)?;
            match key {
                "arch" => constraints.arch = Some(value.to_string()),
                "cores" => constraints.cpu_cores = Some(value.parse().map_err(|_| bad())?),
                "mem" => constraints.mem = Some(parse_size(value).ok_or_else(bad)?),
                _ => return Err(bad()),
            }
        }
        Ok(constraints)
    }
}

/// Parse a memory size with an optional M/G/T suffix into megabytes.
/// A bare number is megabytes.
pub(crate) fn parse_size(s: &str) -> Option<u64> {
    let (digits, multiplier) = match s.chars().last()? {
        'M' => (&s[..s.len() - 1], 1),
        'G' => (&s[..s.len() - 1], 1024),
        'T' => (&s[..s.len() - 1], 1024 * 1024),
        _ => (s, 1),
    };
    digits.parse::<u64>().ok().map(|n| n * multiplier)
}

/// Render megabytes with the largest suffix that divides evenly.
pub(crate) fn format_size(mb: u64) -> String {
    const GB: u64 = 1024;
    const TB: u64 = 1024 * 1024;
    if mb > 0 && mb % TB == 0 {
        format!("{}T", mb / TB)
    } else if mb > 0 && mb % GB == 0 {
        format!("{}G", mb / GB)
    } else {
        format!("{mb}M")
    }
}
