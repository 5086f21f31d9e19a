//! Tools version triples and their storage layout

use crate::error::ToolsError;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage prefix every tools archive lives under.
pub const TOOLS_PREFIX: &str = "tools/";

/// Published archive name stem; part of the wire-compatible storage
/// layout that already-deployed machines download from.
const ARCHIVE_STEM: &str = "juju";

/// One released agent binary build: version plus target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolsVersion {
    pub version: Version,
    pub os: String,
    pub arch: String,
}

impl ToolsVersion {
    pub fn new(version: Version, os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            version,
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for ToolsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.version, self.os, self.arch)
    }
}

impl FromStr for ToolsVersion {
    type Err = ToolsError;

    /// Parse `1.16.0-linux-amd64`. The platform fields are split from
    /// the right so semver prerelease tags keep their dashes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ToolsError::InvalidVersion(s.to_string());
        let (rest, arch) = s.rsplit_once('-').ok_or_else(bad)?;
        let (version, os) = rest.rsplit_once('-').ok_or_else(bad)?;
        if os.is_empty() || arch.is_empty() {
            return Err(bad());
        }
        let version = Version::parse(version).map_err(|_| bad())?;
        Ok(ToolsVersion::new(version, os, arch))
    }
}

/// Tools available to a provisioned machine: which build, and where to
/// fetch it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tools {
    pub version: ToolsVersion,
    pub url: String,
}

/// Storage object name for the archive of `version`, e.g.
/// `tools/juju-1.16.0-linux-amd64.tgz`.
pub fn storage_path(version: &ToolsVersion) -> String {
    format!("{TOOLS_PREFIX}{ARCHIVE_STEM}-{version}.tgz")
}

/// Inverse of [`storage_path`]; `None` for names that are not tools
/// archives.
pub fn parse_storage_path(name: &str) -> Option<ToolsVersion> {
    let stem = name
        .strip_prefix(TOOLS_PREFIX)?
        .strip_prefix(ARCHIVE_STEM)?
        .strip_prefix('-')?
        .strip_suffix(".tgz")?;
    stem.parse().ok()
}
