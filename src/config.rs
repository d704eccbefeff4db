use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InventoryError, Result};

pub const PASSWORD_ENV: &str = "ESXI_PASSWORD";
pub const CONFIG_ENV: &str = "ESXI_INVENTORY_CONFIG";

const DEFAULT_PORT: u16 = 22;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// VM attribute used to bucket hosts into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[value(name = "guestfamily")]
    GuestFamily,
    #[value(name = "guestid")]
    GuestId,
    /// Accepted for compatibility; only running VMs are reported, so it never groups.
    #[value(name = "geststate")]
    GestState,
    #[value(name = "notes")]
    Notes,
}

/// Raw settings as they appear in a config file or on the command line.
/// Every field is optional here; `resolve` decides what is missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigSource {
    pub plugin: Option<String>,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub group_by: Option<Vec<GroupBy>>,
    /// Seconds
    pub connect_timeout: Option<u64>,
    /// Seconds
    pub command_timeout: Option<u64>,
    pub command_retries: Option<u32>,
    pub annotations: Option<bool>,
}

impl ConfigSource {
    /// Overlay `other` on top of `self`; values set in `other` win.
    pub fn merge(self, other: ConfigSource) -> ConfigSource {
        ConfigSource {
            plugin: other.plugin.or(self.plugin),
            hostname: other.hostname.or(self.hostname),
            username: other.username.or(self.username),
            password: other.password.or(self.password),
            port: other.port.or(self.port),
            group_by: other.group_by.or(self.group_by),
            connect_timeout: other.connect_timeout.or(self.connect_timeout),
            command_timeout: other.command_timeout.or(self.command_timeout),
            command_retries: other.command_retries.or(self.command_retries),
            annotations: other.annotations.or(self.annotations),
        }
    }
}

/// Validated settings for one inventory run.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub group_by: Vec<GroupBy>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub command_retries: u32,
    pub annotations: bool,
}

impl InventoryConfig {
    /// Validate merged settings. `env` is consulted for the password fallback.
    pub fn resolve<F>(source: ConfigSource, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = required(source.hostname, "hostname")?;
        let username = required(source.username, "username")?;
        let password = required(
            source.password.filter(|p| !p.is_empty()).or_else(|| env(PASSWORD_ENV)),
            "password",
        )?;

        if let Some(plugin) = &source.plugin {
            debug!("config written for plugin {}", plugin);
        }

        let mut group_by = Vec::new();
        for key in source.group_by.unwrap_or_default() {
            if !group_by.contains(&key) {
                group_by.push(key);
            }
        }

        Ok(InventoryConfig {
            hostname,
            username,
            password,
            port: source.port.unwrap_or(DEFAULT_PORT),
            group_by,
            connect_timeout: timeout(
                source.connect_timeout,
                DEFAULT_CONNECT_TIMEOUT_SECS,
                "connect_timeout",
            )?,
            command_timeout: timeout(
                source.command_timeout,
                DEFAULT_COMMAND_TIMEOUT_SECS,
                "command_timeout",
            )?,
            command_retries: source.command_retries.unwrap_or(0),
            annotations: source.annotations.unwrap_or(true),
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(InventoryError::MissingValue(name)),
    }
}

/// A zero timeout means "never time out" to libssh2 and fails outright for
/// TCP connect, so it is refused.
fn timeout(secs: Option<u64>, default: u64, name: &'static str) -> Result<Duration> {
    match secs.unwrap_or(default) {
        0 => Err(InventoryError::InvalidValue {
            name,
            reason: "must be at least 1 second".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Read a YAML config file.
pub fn load_config_file(path: &Path) -> Result<ConfigSource> {
    let content = fs::read_to_string(path).map_err(|source| InventoryError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    // An empty file is a valid, empty config
    if content.trim().is_empty() {
        return Ok(ConfigSource::default());
    }

    serde_yaml::from_str(&content).map_err(|e| InventoryError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Default config location: `<config dir>/esxi-inventory/esxi.yml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("esxi-inventory").join("esxi.yml"))
}

/// Find and load the config file, if any.
///
/// An explicitly named file (flag or environment) must exist; the default
/// location is used only when present.
pub fn discover_config<F>(explicit: Option<&Path>, env: F) -> Result<ConfigSource>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return load_config_file(path);
    }

    if let Some(path) = env(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return load_config_file(Path::new(&path));
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            debug!("using config file {}", path.display());
            load_config_file(&path)
        }
        _ => Ok(ConfigSource::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn full_source() -> ConfigSource {
        ConfigSource {
            hostname: Some("esx01.example.com".into()),
            username: Some("root".into()),
            password: Some("secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_defaults() {
        let config = InventoryConfig::resolve(full_source(), no_env).unwrap();
        assert_eq!(config.port, 22);
        assert!(config.group_by.is_empty());
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.command_retries, 0);
        assert!(config.annotations);
    }

    #[test]
    fn test_missing_required_values() {
        for (field, mut source) in [
            ("hostname", ConfigSource { hostname: None, ..full_source() }),
            ("username", ConfigSource { username: Some(String::new()), ..full_source() }),
            ("password", ConfigSource { password: None, ..full_source() }),
        ] {
            source.group_by = Some(vec![GroupBy::Notes]);
            let err = InventoryConfig::resolve(source, no_env).unwrap_err();
            assert!(
                matches!(err, InventoryError::MissingValue(name) if name == field),
                "expected missing {}, got {}",
                field,
                err
            );
        }
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let source = ConfigSource { connect_timeout: Some(0), ..full_source() };
        let err = InventoryConfig::resolve(source, no_env).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidValue { name: "connect_timeout", .. }));

        let source = ConfigSource { command_timeout: Some(0), ..full_source() };
        let err = InventoryConfig::resolve(source, no_env).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidValue { name: "command_timeout", .. }));

        let source = ConfigSource {
            connect_timeout: Some(1),
            command_timeout: Some(1),
            ..full_source()
        };
        let config = InventoryConfig::resolve(source, no_env).unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.command_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_password_env_fallback() {
        let source = ConfigSource { password: Some(String::new()), ..full_source() };
        let config = InventoryConfig::resolve(source, |key| {
            (key == PASSWORD_ENV).then(|| "from-env".to_string())
        })
        .unwrap();
        assert_eq!(config.password, "from-env");
    }

    #[test]
    fn test_config_password_beats_env() {
        let config =
            InventoryConfig::resolve(full_source(), |_| Some("from-env".to_string())).unwrap();
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn test_group_by_deduplicated() {
        let source = ConfigSource {
            group_by: Some(vec![GroupBy::GuestId, GroupBy::Notes, GroupBy::GuestId]),
            ..full_source()
        };
        let config = InventoryConfig::resolve(source, no_env).unwrap();
        assert_eq!(config.group_by, vec![GroupBy::GuestId, GroupBy::Notes]);
    }

    #[test]
    fn test_merge_prefers_override() {
        let file = ConfigSource {
            hostname: Some("file-host".into()),
            port: Some(2222),
            ..full_source()
        };
        let cli = ConfigSource {
            hostname: Some("cli-host".into()),
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.hostname.as_deref(), Some("cli-host"));
        assert_eq!(merged.port, Some(2222));
        assert_eq!(merged.username.as_deref(), Some("root"));
    }

    #[test]
    fn test_load_plugin_style_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esxi.yml");
        let mut f = fs::File::create(&path).unwrap();
        write!(
            f,
            r#"
plugin: community.esxi.esxi_inventory
hostname: 'hypervisor.example.com'
username: 'root'
group_by:
  - guestfamily
  - guestid
  - geststate
  - notes
cache: true
"#
        )
        .unwrap();

        let source = load_config_file(&path).unwrap();
        assert_eq!(source.plugin.as_deref(), Some("community.esxi.esxi_inventory"));
        assert_eq!(source.hostname.as_deref(), Some("hypervisor.example.com"));
        assert_eq!(source.password, None);
        assert_eq!(
            source.group_by,
            Some(vec![GroupBy::GuestFamily, GroupBy::GuestId, GroupBy::GestState, GroupBy::Notes])
        );
    }

    #[test]
    fn test_load_rejects_unknown_group_by() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esxi.yml");
        fs::write(&path, "hostname: esx\ngroup_by: [powerstate]\n").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, InventoryError::ConfigParse { .. }));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yml");
        let err = discover_config(Some(&path), no_env).unwrap_err();
        assert!(matches!(err, InventoryError::ConfigLoad { .. }));
    }

    #[test]
    fn test_empty_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esxi.yml");
        fs::write(&path, "\n").unwrap();
        let source = load_config_file(&path).unwrap();
        assert!(source.hostname.is_none());
    }
}
