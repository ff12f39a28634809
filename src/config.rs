use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::errors::Error;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/cloud/cloud.cfg";
pub const DEFAULT_IDENTITY_FILE: &str = "/sys/class/dmi/id/product_uuid";
pub const DEFAULT_INTERFACES_FILE: &str = "/etc/network/interfaces";

/// Name of this datasource's section below `datasource:` in cloud.cfg.
pub const DATASOURCE_NAME: &str = "VmwareGuestinfo";

#[derive(Deserialize, Debug, Default)]
struct CloudConfig {
    #[serde(default)]
    datasource: DatasourceSection,
}

#[derive(Deserialize, Debug, Default)]
struct DatasourceSection {
    #[serde(rename = "VmwareGuestinfo", default)]
    vmware_guestinfo: Config,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Directories searched for vmware-rpctool ahead of PATH
    pub path: Vec<PathBuf>,
    /// Human readable limit on a single vmware-rpctool call, e.g. "30s"
    pub timeout: Option<String>,
    pub identity_file: PathBuf,
    pub interfaces_file: PathBuf,
    pub bringup_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            path: Vec::new(),
            timeout: None,
            identity_file: PathBuf::from(DEFAULT_IDENTITY_FILE),
            interfaces_file: PathBuf::from(DEFAULT_INTERFACES_FILE),
            bringup_command: vec!["ifup".into(), "--all".into()],
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        // An empty document deserializes to unit, not to a mapping
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        let cloud_config: CloudConfig = serde_yaml::from_str(text)?;
        Ok(cloud_config.datasource.vmware_guestinfo)
    }

    /// Load `path`, or the default cloud.cfg when none is given. Only the
    /// default location is allowed to be missing.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!("config: loaded {}", path.display());
                Config::from_yaml(&text)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                debug!("config: {} not found, using defaults", path.display());
                Ok(Config::default())
            }
            Err(e) => Err(Error::ConfigRead(path.to_path_buf(), e)),
        }
    }

    pub fn timeout(&self) -> Result<Option<Duration>, Error> {
        self.timeout
            .as_deref()
            .map(|t| humanize_rs::duration::parse(t).map_err(Error::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_when_section_missing() {
        let config = Config::from_yaml("datasource_list: [VmwareGuestinfo, None]\n").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn reads_datasource_section() {
        let config = Config::from_yaml(
            r#"
datasource:
  VmwareGuestinfo:
    path: [/opt/vmware/bin, /usr/local/sbin]
    timeout: 30s
    interfaces_file: /tmp/interfaces
  OVF:
    ignored: true
"#,
        )
        .unwrap();
        assert_eq!(
            config.path,
            vec![PathBuf::from("/opt/vmware/bin"), PathBuf::from("/usr/local/sbin")]
        );
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(config.interfaces_file, PathBuf::from("/tmp/interfaces"));
        assert_eq!(config.identity_file, PathBuf::from(DEFAULT_IDENTITY_FILE));
    }

    #[test]
    fn rejects_malformed_sections() {
        let result = Config::from_yaml("datasource:\n  VmwareGuestinfo:\n    path: /not/a/list\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn no_timeout_by_default() {
        assert_eq!(Config::default().timeout().unwrap(), None);
    }

    #[test]
    fn invalid_timeout() {
        let config = Config {
            timeout: Some("soon".into()),
            ..Config::default()
        };
        assert!(matches!(config.timeout(), Err(Error::ParseHumanize(_))));
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("cloud.cfg");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(Error::ConfigRead(_, _))
        ));

        let mut file = std::fs::File::create(&missing).unwrap();
        writeln!(file, "datasource:\n  VmwareGuestinfo:\n    path: [/srv]").unwrap();
        let config = Config::load(Some(&missing)).unwrap();
        assert_eq!(config.path, vec![PathBuf::from("/srv")]);
    }
}
