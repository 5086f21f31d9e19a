//! Agent configuration: construction, persistence, and migration dispatch

use crate::error::{AgentError, Result};
use crate::format::{CONFIG_FILE, FORMAT_FILE, Format, read_format};
use crate::v1;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Nonce carried by the first (bootstrap) machine. It provisions
/// itself, so there is no external provisioning request to prove.
pub const BOOTSTRAP_NONCE: &str = "user-admin:bootstrap";

const AGENTS_DIR: &str = "agents";

/// Per-machine control-plane credentials.
///
/// Constructed in memory with [`AgentConfig::new`], persisted under
/// `<data_dir>/agents/<tag>/`, and later re-read — migrated when the
/// on-disk format predates the current one — by the owning agent
/// process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Root of the agent's state tree.
    pub data_dir: PathBuf,
    /// Entity identifier of the machine this config belongs to.
    pub tag: String,
    /// One-time token proving this machine's provisioning request is
    /// genuine.
    pub nonce: String,
    /// CA certificate (PEM) used to authenticate the control plane.
    pub ca_cert: String,
    pub password: String,
    pub state_addresses: Vec<String>,
    pub api_addresses: Vec<String>,
    /// Server certificate, present only on state-server machines.
    pub state_server_cert: Option<String>,
    pub state_server_key: Option<String>,
}

/// Input to [`AgentConfig::new`].
#[derive(Debug, Clone, Default)]
pub struct AgentParams {
    pub data_dir: PathBuf,
    pub tag: String,
    pub nonce: String,
    pub ca_cert: String,
    pub password: String,
    pub state_addresses: Vec<String>,
    pub api_addresses: Vec<String>,
    pub state_server_cert: Option<String>,
    pub state_server_key: Option<String>,
}

/// The YAML shape persisted by the current format. Location-derived
/// fields (data dir, tag) are not stored.
#[derive(Debug, Serialize, Deserialize)]
struct ConfV2 {
    nonce: String,
    ca_cert: String,
    password: String,
    state_addresses: Vec<String>,
    api_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state_server_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state_server_key: Option<String>,
}

impl AgentConfig {
    pub fn new(params: AgentParams) -> Result<AgentConfig> {
        let conf = AgentConfig {
            data_dir: params.data_dir,
            tag: params.tag,
            nonce: params.nonce,
            ca_cert: params.ca_cert,
            password: params.password,
            state_addresses: params.state_addresses,
            api_addresses: params.api_addresses,
            state_server_cert: params.state_server_cert,
            state_server_key: params.state_server_key,
        };
        conf.check()?;
        Ok(conf)
    }

    /// The per-tag directory holding the marker and serialized config.
    pub fn dir(&self) -> PathBuf {
        config_dir(&self.data_dir, &self.tag)
    }

    /// Read the config for `tag`, migrating a previous-format directory
    /// into the current in-memory shape. Reading never rewrites the
    /// directory.
    pub async fn read(data_dir: &Path, tag: &str) -> Result<AgentConfig> {
        let dir = config_dir(data_dir, tag);
        let conf = match read_format(&dir).await? {
            Format::V2 => {
                let content = fs::read(dir.join(CONFIG_FILE)).await?;
                let on_disk: ConfV2 = serde_yaml::from_slice(&content)?;
                AgentConfig {
                    data_dir: data_dir.to_path_buf(),
                    tag: tag.to_string(),
                    nonce: on_disk.nonce,
                    ca_cert: on_disk.ca_cert,
                    password: on_disk.password,
                    state_addresses: on_disk.state_addresses,
                    api_addresses: on_disk.api_addresses,
                    state_server_cert: on_disk.state_server_cert,
                    state_server_key: on_disk.state_server_key,
                }
            }
            Format::V1 => {
                tracing::info!(tag, "migrating agent config from format 1");
                v1::migrate(v1::read(&dir).await?, data_dir, tag)
            }
        };
        conf.check()?;
        Ok(conf)
    }

    /// Durably write the current format: serialized config and format
    /// marker, each through a temp-then-rename so a crash mid-write
    /// never leaves a half-written file visible.
    pub async fn write(&self) -> Result<()> {
        let dir = self.dir();
        fs::create_dir_all(&dir).await?;
        write_atomic(&dir.join(CONFIG_FILE), self.serialized()?.as_bytes(), 0o600).await?;
        let marker = format!("{}\n", Format::CURRENT.marker());
        write_atomic(&dir.join(FORMAT_FILE), marker.as_bytes(), 0o644).await?;
        tracing::debug!(tag = %self.tag, dir = %dir.display(), "wrote agent config");
        Ok(())
    }

    /// Shell commands that reproduce [`AgentConfig::write`] on a remote
    /// machine with no direct filesystem access. The file contents are
    /// byte-for-byte what a local write produces.
    pub fn write_commands(&self) -> Result<Vec<String>> {
        let dir = self.dir();
        let mut commands = vec![format!("mkdir -p {}", shquote(&dir.display().to_string()))];
        let marker = format!("{}\n", Format::CURRENT.marker());
        commands.extend(write_file_commands(&dir.join(FORMAT_FILE), &marker, 0o644));
        commands.extend(write_file_commands(
            &dir.join(CONFIG_FILE),
            &self.serialized()?,
            0o600,
        ));
        Ok(commands)
    }

    /// Rotate the password: generate a new credential, commit it to
    /// disk, and only then report it back.
    pub async fn write_new_password(&mut self) -> Result<String> {
        let new_password = random_password();
        let mut updated = self.clone();
        updated.password = new_password.clone();
        updated.write().await?;
        self.password = new_password.clone();
        tracing::debug!(tag = %self.tag, "rotated agent password");
        Ok(new_password)
    }

    fn serialized(&self) -> Result<String> {
        let on_disk = ConfV2 {
            nonce: self.nonce.clone(),
            ca_cert: self.ca_cert.clone(),
            password: self.password.clone(),
            state_addresses: self.state_addresses.clone(),
            api_addresses: self.api_addresses.clone(),
            state_server_cert: self.state_server_cert.clone(),
            state_server_key: self.state_server_key.clone(),
        };
        Ok(serde_yaml::to_string(&on_disk)?)
    }

    fn check(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(AgentError::Missing("data directory"));
        }
        if self.tag.is_empty() {
            return Err(AgentError::Missing("entity tag"));
        }
        if self.password.is_empty() {
            return Err(AgentError::Missing("password"));
        }
        if self.ca_cert.is_empty() {
            return Err(AgentError::Missing("CA certificate"));
        }
        if self.state_addresses.is_empty() && self.api_addresses.is_empty() {
            return Err(AgentError::Missing("state or API addresses"));
        }
        for addr in self.state_addresses.iter().chain(&self.api_addresses) {
            check_addr(addr)?;
        }
        Ok(())
    }
}

/// Generate a fresh random password.
pub fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

fn config_dir(data_dir: &Path, tag: &str) -> PathBuf {
    data_dir.join(AGENTS_DIR).join(tag)
}

/// An address must parse as `host:port`.
fn check_addr(addr: &str) -> Result<()> {
    let valid = match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AgentError::InvalidAddress(addr.to_string()))
    }
}

async fn write_atomic(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AgentError::Io(std::io::Error::other("path has no file name")))?;
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    fs::write(&tmp, data).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn write_file_commands(path: &Path, content: &str, mode: u32) -> Vec<String> {
    let quoted_path = shquote(&path.display().to_string());
    vec![
        format!("install -m {mode:o} /dev/null {quoted_path}"),
        format!("printf '%s' {} >> {}", shquote(content), quoted_path),
    ]
}

fn shquote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn params(data_dir: &Path) -> AgentParams {
        AgentParams {
            data_dir: data_dir.to_path_buf(),
            tag: "machine-7".to_string(),
            nonce: "fake-nonce".to_string(),
            ca_cert: "CA CERT\n".to_string(),
            password: "sekrit".to_string(),
            state_addresses: vec!["control.example.com:37017".to_string()],
            api_addresses: vec!["control.example.com:17070".to_string()],
            state_server_cert: None,
            state_server_key: None,
        }
    }

    #[test]
    fn required_fields_fail_in_priority_order() {
        let dir = tempdir().unwrap();
        let cases: Vec<(Box<dyn Fn(&mut AgentParams)>, &str)> = vec![
            (
                Box::new(|p| p.data_dir = PathBuf::new()),
                "data directory not found in configuration",
            ),
            (
                Box::new(|p| p.tag = String::new()),
                "entity tag not found in configuration",
            ),
            (
                Box::new(|p| p.password = String::new()),
                "password not found in configuration",
            ),
            (
                Box::new(|p| p.ca_cert = String::new()),
                "CA certificate not found in configuration",
            ),
            (
                Box::new(|p| {
                    p.state_addresses.clear();
                    p.api_addresses.clear();
                }),
                "state or API addresses not found in configuration",
            ),
        ];
        for (mutate, want) in cases {
            let mut p = params(dir.path());
            mutate(&mut p);
            let err = AgentConfig::new(p).unwrap_err();
            assert_eq!(err.to_string(), want);
        }
    }

    #[test]
    fn missing_data_dir_outranks_missing_tag() {
        let mut p = params(Path::new("unused"));
        p.data_dir = PathBuf::new();
        p.tag = String::new();
        let err = AgentConfig::new(p).unwrap_err();
        assert_eq!(err.to_string(), "data directory not found in configuration");
    }

    #[test]
    fn malformed_address_names_the_entry() {
        let dir = tempdir().unwrap();

        let mut p = params(dir.path());
        p.state_addresses = vec!["bad-address".to_string()];
        let err = AgentConfig::new(p).unwrap_err();
        assert_eq!(err.to_string(), "invalid address \"bad-address\"");

        let mut p = params(dir.path());
        p.api_addresses = vec!["host:notaport".to_string()];
        let err = AgentConfig::new(p).unwrap_err();
        assert_eq!(err.to_string(), "invalid address \"host:notaport\"");
    }

    #[test]
    fn one_address_list_is_enough() {
        let dir = tempdir().unwrap();
        let mut p = params(dir.path());
        p.api_addresses.clear();
        AgentConfig::new(p).unwrap();
    }

    #[tokio::test]
    async fn write_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut p = params(dir.path());
        p.state_server_cert = Some("SERVER CERT\n".to_string());
        p.state_server_key = Some("SERVER KEY\n".to_string());
        let conf = AgentConfig::new(p).unwrap();

        conf.write().await.unwrap();
        let reread = AgentConfig::read(dir.path(), &conf.tag).await.unwrap();

        assert_eq!(reread, conf);
        assert_eq!(
            reread.write_commands().unwrap(),
            conf.write_commands().unwrap()
        );
    }

    #[tokio::test]
    async fn write_is_atomic_and_sets_the_marker() {
        let dir = tempdir().unwrap();
        let conf = AgentConfig::new(params(dir.path())).unwrap();
        conf.write().await.unwrap();

        let conf_dir = conf.dir();
        let marker = std::fs::read_to_string(conf_dir.join(FORMAT_FILE)).unwrap();
        assert_eq!(marker, "format 2\n");

        // No temp debris left behind.
        for entry in std::fs::read_dir(&conf_dir).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(!name.to_string_lossy().ends_with(".tmp"), "{name:?}");
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(conf_dir.join(FORMAT_FILE))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[tokio::test]
    async fn markerless_directory_reads_as_previous_format() {
        let dir = tempdir().unwrap();
        let conf_dir = config_dir(dir.path(), "machine-7");
        std::fs::create_dir_all(&conf_dir).unwrap();
        std::fs::write(
            conf_dir.join(CONFIG_FILE),
            serde_json::json!({
                "password": "sekrit",
                "ca_cert": "CA CERT\n",
                "state_addresses": ["control.example.com:37017"],
                "api_addresses": ["control.example.com:17070"],
            })
            .to_string(),
        )
        .unwrap();

        let migrated = AgentConfig::read(dir.path(), "machine-7").await.unwrap();
        assert_eq!(migrated.nonce, BOOTSTRAP_NONCE);

        // Behaviorally identical to a config built directly under the
        // current format with equivalent fields.
        let mut p = params(dir.path());
        p.nonce = BOOTSTRAP_NONCE.to_string();
        let direct = AgentConfig::new(p).unwrap();
        assert_eq!(migrated, direct);
        assert_eq!(
            migrated.write_commands().unwrap(),
            direct.write_commands().unwrap()
        );

        // Reading alone must not rewrite the directory.
        assert!(!conf_dir.join(FORMAT_FILE).exists());
    }

    #[tokio::test]
    async fn write_new_password_commits_before_reporting() {
        let dir = tempdir().unwrap();
        let mut conf = AgentConfig::new(params(dir.path())).unwrap();
        conf.write().await.unwrap();
        let old_password = conf.password.clone();

        let new_password = conf.write_new_password().await.unwrap();
        assert_ne!(new_password, old_password);
        assert_eq!(conf.password, new_password);

        let reread = AgentConfig::read(dir.path(), &conf.tag).await.unwrap();
        assert_eq!(reread.password, new_password);
    }

    #[test]
    fn write_commands_quote_shell_metacharacters() {
        let dir = tempdir().unwrap();
        let mut p = params(dir.path());
        p.password = "it's complicated".to_string();
        let conf = AgentConfig::new(p).unwrap();

        let commands = conf.write_commands().unwrap();
        assert_eq!(commands[0], format!("mkdir -p '{}'", conf.dir().display()));
        assert!(commands.iter().any(|c| c.contains(r"it'\''s complicated")));
    }
}
