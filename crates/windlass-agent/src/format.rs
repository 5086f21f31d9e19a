//! On-disk format identification

use crate::error::{AgentError, Result};
use std::path::Path;
use tokio::fs;

/// Name of the format marker file inside the per-tag directory.
pub const FORMAT_FILE: &str = "format";

/// Name of the serialized configuration file, shared by all formats.
pub const CONFIG_FILE: &str = "agent.conf";

/// The closed set of on-disk configuration formats.
///
/// Exactly two formats are live at any time and migration is defined a
/// single hop back, from [`Format::PREVIOUS`] to [`Format::CURRENT`].
/// Deeper chains are deliberately unsupported: stable releases freeze
/// the format, so a directory can only ever be one release behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Legacy JSON layout, written before the marker file existed.
    V1,
    /// Current YAML layout.
    V2,
}

impl Format {
    pub const CURRENT: Format = Format::V2;
    pub const PREVIOUS: Format = Format::V1;

    /// The single-line token stored in the marker file.
    pub fn marker(self) -> &'static str {
        match self {
            Format::V1 => "format 1",
            Format::V2 => "format 2",
        }
    }

    pub fn from_marker(token: &str) -> Result<Format> {
        match token.trim_end() {
            "format 1" => Ok(Format::V1),
            "format 2" => Ok(Format::V2),
            other => Err(AgentError::UnknownFormat(other.to_string())),
        }
    }
}

/// Resolve the on-disk format of the config directory `dir`.
///
/// A missing marker file is not an error: directories written before
/// the marker existed are read as the previous format.
pub async fn read_format(dir: &Path) -> Result<Format> {
    let path = dir.join(FORMAT_FILE);
    match fs::read_to_string(&path).await {
        Ok(content) => Format::from_marker(&content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Format::PREVIOUS),
        Err(err) => Err(err.into()),
    }
}
