//! Publishing and discovering tools in environment storage

use crate::archive::build_archive;
use crate::error::Result;
use crate::version::{TOOLS_PREFIX, Tools, ToolsVersion, parse_storage_path, storage_path};
use std::path::Path;
use windlass_storage::Storage;

/// Build the archive for `version` from the binaries in `dir` and put
/// it at the canonical storage path, returning the uploaded [`Tools`]
/// with its externally fetchable URL.
pub async fn upload(storage: &dyn Storage, dir: &Path, version: &ToolsVersion) -> Result<Tools> {
    let data = build_archive(dir)?;
    let path = storage_path(version);
    storage.put(&path, &data).await?;
    let url = storage.url(&path)?;
    tracing::info!(%version, %url, "uploaded tools archive");
    Ok(Tools {
        version: version.clone(),
        url,
    })
}

/// List the tools published for a major version, skipping objects under
/// the tools prefix whose names do not parse.
pub async fn list_tools(storage: &dyn Storage, major: u64) -> Result<Vec<Tools>> {
    let mut tools = Vec::new();
    for name in storage.list(TOOLS_PREFIX).await? {
        match parse_storage_path(&name) {
            Some(version) if version.version.major == major => {
                let url = storage.url(&name)?;
                tools.push(Tools { version, url });
            }
            Some(_) => {}
            None => tracing::debug!(%name, "ignoring non-tools object under tools prefix"),
        }
    }
    Ok(tools)
}
