//! Reproducible tools archive build and extraction

use crate::error::{Result, ToolsError};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::{Archive, Builder, Header};

/// Build the gzip-compressed tar archive for the tools in `dir`.
///
/// Every entry must be a regular, user-executable file; anything else
/// aborts with a named error. Entries are written with mode 0755 and a
/// fixed owner, regardless of the local build environment's umask or
/// user identity, so the same inputs always produce the same archive.
pub fn build_archive(dir: &Path) -> Result<Vec<u8>> {
    tracing::debug!("building tools archive from {}", dir.display());

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut archive_data = Vec::new();
    {
        let encoder = GzEncoder::new(&mut archive_data, Compression::default());
        let mut tar = Builder::new(encoder);

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type()?.is_file() {
                return Err(ToolsError::NotRegularFile(name));
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if entry.metadata()?.permissions().mode() & 0o100 == 0 {
                    return Err(ToolsError::NotExecutable(name));
                }
            }

            let mut content = Vec::new();
            File::open(entry.path())?.read_to_end(&mut content)?;

            let mut header = Header::new_gnu();
            header.set_path(&name)?;
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_uid(0);
            header.set_gid(0);
            header.set_username("root")?;
            header.set_groupname("root")?;
            header.set_mtime(0);
            header.set_cksum();
            tar.append(&header, content.as_slice())?;
        }

        let encoder = tar.into_inner()?;
        encoder.finish()?;
    }

    tracing::debug!("tools archive built: {} bytes", archive_data.len());
    Ok(archive_data)
}

/// Unpack a tools archive into `target`.
///
/// Entry names containing a backslash immediately after a path
/// separator are rejected as a defense against path-escaping names.
pub fn unpack_archive(data: &[u8], target: &Path) -> Result<()> {
    std::fs::create_dir_all(target)?;

    let decoder = GzDecoder::new(data);
    let mut archive = Archive::new(decoder);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if name.contains("/\\") {
            return Err(ToolsError::UnsafeEntryName(name));
        }
        entry.unpack_in(target)?;
    }
    Ok(())
}
